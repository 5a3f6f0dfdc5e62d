//! Per-frame keypoint samples as produced by the tracker.

use crate::error::{PupilError, Result};

/// One tracked point in one frame. Missing values are NaN.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeypointSample {
    pub x: f64,
    pub y: f64,
    /// Tracker confidence in [0, 1].
    pub likelihood: f64,
}

impl KeypointSample {
    pub const MISSING: Self = Self {
        x: f64::NAN,
        y: f64::NAN,
        likelihood: f64::NAN,
    };

    pub fn new(x: f64, y: f64, likelihood: f64) -> Self {
        Self { x, y, likelihood }
    }

    /// `true` when coordinates and likelihood are all finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.likelihood.is_finite()
    }

    /// Strictly above `min_certainty`. NaN likelihood is never confident.
    pub fn is_confident(&self, min_certainty: f64) -> bool {
        self.likelihood > min_certainty
    }
}

/// Time series of one bodypart.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointTrack {
    pub name: String,
    pub samples: Vec<KeypointSample>,
}

impl KeypointTrack {
    pub fn new(name: impl Into<String>, samples: Vec<KeypointSample>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }
}

/// All bodyparts of one tracking file, aligned by frame index.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointTable {
    tracks: Vec<KeypointTrack>,
    n_frames: usize,
}

impl KeypointTable {
    /// Build a table. Tracks must share one length and have unique names.
    pub fn new(tracks: Vec<KeypointTrack>) -> Result<Self> {
        let n_frames = tracks.first().map_or(0, |t| t.samples.len());
        for (i, t) in tracks.iter().enumerate() {
            if t.samples.len() != n_frames {
                return Err(PupilError::InvalidInput(format!(
                    "bodypart '{}' has {} frames, expected {}",
                    t.name,
                    t.samples.len(),
                    n_frames
                )));
            }
            if tracks[..i].iter().any(|o| o.name == t.name) {
                return Err(PupilError::InvalidInput(format!(
                    "duplicate bodypart '{}'",
                    t.name
                )));
            }
        }
        Ok(Self { tracks, n_frames })
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn tracks(&self) -> &[KeypointTrack] {
        &self.tracks
    }

    pub fn bodyparts(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracks.iter().map(|t| t.name.as_str())
    }

    pub fn track(&self, name: &str) -> Option<&KeypointTrack> {
        self.tracks.iter().find(|t| t.name == name)
    }

    /// Samples of a bodypart that must be present.
    pub fn require(&self, name: &str) -> Result<&[KeypointSample]> {
        self.track(name)
            .map(|t| t.samples.as_slice())
            .ok_or_else(|| PupilError::InvalidInput(format!("missing bodypart '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_track_lengths_are_rejected() {
        let tracks = vec![
            KeypointTrack::new("a", vec![KeypointSample::new(0.0, 0.0, 1.0); 3]),
            KeypointTrack::new("b", vec![KeypointSample::new(0.0, 0.0, 1.0); 2]),
        ];
        assert!(matches!(
            KeypointTable::new(tracks),
            Err(PupilError::InvalidInput(_))
        ));
    }

    #[test]
    fn missing_sample_is_never_confident() {
        assert!(!KeypointSample::MISSING.is_confident(0.0));
        assert!(!KeypointSample::MISSING.is_finite());
        assert!(KeypointSample::new(1.0, 2.0, 0.7).is_confident(0.6));
        assert!(!KeypointSample::new(1.0, 2.0, 0.6).is_confident(0.6));
    }

    #[test]
    fn require_reports_missing_bodypart() {
        let table = KeypointTable::new(vec![KeypointTrack::new(
            "leftpupil",
            vec![KeypointSample::new(0.0, 0.0, 1.0)],
        )])
        .unwrap();
        assert!(table.require("leftpupil").is_ok());
        assert!(matches!(
            table.require("rightpupil"),
            Err(PupilError::InvalidInput(_))
        ));
    }
}
