//! Raw geometry and per-frame validity from the keypoint table.

use crate::config::RingLayout;
use crate::error::Result;
use crate::keypoints::{KeypointSample, KeypointTable};

/// Why a frame is (in)valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    Valid,
    /// A required coordinate or likelihood is NaN.
    Missing,
    /// Some tracked point is at or below the certainty threshold.
    LowConfidence,
    /// Non-positive width or height.
    DegenerateGeometry,
}

/// The layout's points for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingPoints {
    pub left: KeypointSample,
    pub right: KeypointSample,
    pub dorsal: KeypointSample,
    pub ventral: KeypointSample,
    pub dorsal_lid: Option<KeypointSample>,
    pub ventral_lid: Option<KeypointSample>,
}

impl RingPoints {
    fn all(&self) -> impl Iterator<Item = &KeypointSample> {
        [&self.left, &self.right, &self.dorsal, &self.ventral]
            .into_iter()
            .chain(self.dorsal_lid.iter())
            .chain(self.ventral_lid.iter())
    }

    /// Minimum likelihood over every tracked point; NaN if any is NaN.
    pub fn min_likelihood(&self) -> f64 {
        self.all().fold(f64::INFINITY, |acc, s| {
            if acc.is_nan() || s.likelihood.is_nan() {
                f64::NAN
            } else {
                acc.min(s.likelihood)
            }
        })
    }

    /// Both horizontal extremes are confident.
    pub fn width_confident(&self, min_certainty: f64) -> bool {
        self.left.is_confident(min_certainty) && self.right.is_confident(min_certainty)
    }
}

/// One video frame after validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    pub index: usize,
    pub points: RingPoints,
    /// `right.x - left.x`.
    pub width: f64,
    /// `ventral.y - dorsal.y`.
    pub height: f64,
    /// Midpoint of the horizontal extent.
    pub center_x: f64,
    pub status: FrameStatus,
}

impl FrameRecord {
    pub fn valid(&self) -> bool {
        self.status == FrameStatus::Valid
    }
}

/// Frame counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameCounts {
    pub total: usize,
    pub valid: usize,
    pub missing: usize,
    pub low_confidence: usize,
    pub degenerate_geometry: usize,
}

/// Validated trace: one record per input frame, in frame order.
#[derive(Debug, Clone)]
pub struct RawTrace {
    pub frames: Vec<FrameRecord>,
    pub min_certainty: f64,
}

impl RawTrace {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn n_valid(&self) -> usize {
        self.frames.iter().filter(|f| f.valid()).count()
    }

    /// `true` when both eyelid points are tracked.
    pub fn has_lids(&self) -> bool {
        self.frames
            .first()
            .is_some_and(|f| f.points.dorsal_lid.is_some() && f.points.ventral_lid.is_some())
    }

    pub fn counts(&self) -> FrameCounts {
        let mut c = FrameCounts {
            total: self.frames.len(),
            ..Default::default()
        };
        for f in &self.frames {
            match f.status {
                FrameStatus::Valid => c.valid += 1,
                FrameStatus::Missing => c.missing += 1,
                FrameStatus::LowConfidence => c.low_confidence += 1,
                FrameStatus::DegenerateGeometry => c.degenerate_geometry += 1,
            }
        }
        c
    }
}

/// Compute raw geometry and validity for every frame.
///
/// Validity uses the minimum likelihood over all layout points (pupil ring and
/// any tracked eyelids); it must strictly exceed `min_certainty`.
pub fn validate_frames(
    table: &KeypointTable,
    layout: &RingLayout,
    min_certainty: f64,
) -> Result<RawTrace> {
    let left = table.require(&layout.left)?;
    let right = table.require(&layout.right)?;
    let dorsal = table.require(&layout.dorsal)?;
    let ventral = table.require(&layout.ventral)?;
    let dorsal_lid = optional_track(table, layout.dorsal_lid.as_deref());
    let ventral_lid = optional_track(table, layout.ventral_lid.as_deref());

    let frames: Vec<FrameRecord> = (0..table.n_frames())
        .map(|i| {
            let points = RingPoints {
                left: left[i],
                right: right[i],
                dorsal: dorsal[i],
                ventral: ventral[i],
                dorsal_lid: dorsal_lid.map(|t| t[i]),
                ventral_lid: ventral_lid.map(|t| t[i]),
            };
            build_record(i, points, min_certainty)
        })
        .collect();

    let trace = RawTrace {
        frames,
        min_certainty,
    };
    let c = trace.counts();
    tracing::info!(
        "Validated {} frames: {} valid, {} missing, {} low-confidence, {} degenerate",
        c.total,
        c.valid,
        c.missing,
        c.low_confidence,
        c.degenerate_geometry
    );
    Ok(trace)
}

fn optional_track<'a>(table: &'a KeypointTable, name: Option<&str>) -> Option<&'a [KeypointSample]> {
    let name = name?;
    let track = table.track(name);
    if track.is_none() {
        tracing::warn!("eyelid bodypart '{}' not found; lid criteria disabled", name);
    }
    track.map(|t| t.samples.as_slice())
}

fn build_record(index: usize, points: RingPoints, min_certainty: f64) -> FrameRecord {
    let width = points.right.x - points.left.x;
    let height = points.ventral.y - points.dorsal.y;
    let center_x = points.left.x + 0.5 * width;

    let status = if !points.all().all(KeypointSample::is_finite) {
        FrameStatus::Missing
    } else if points.min_likelihood() <= min_certainty {
        FrameStatus::LowConfidence
    } else if width <= 0.0 || height <= 0.0 {
        FrameStatus::DegenerateGeometry
    } else {
        FrameStatus::Valid
    };

    FrameRecord {
        index,
        points,
        width,
        height,
        center_x,
        status,
    }
}
