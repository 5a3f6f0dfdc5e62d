use std::path::PathBuf;

use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::stages::blink::{BlinkFlagCounts, BlinkInterval};
use crate::stages::height_model::HeightModel;
use crate::stages::validate::FrameCounts;

/// Final per-frame pupil trace for one tracking file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PupilEstimate {
    pub center_x: Vec<f64>,
    pub center_y: Vec<f64>,
    /// Pupil diameter in pixels, never negative.
    pub diameter: Vec<f64>,
    /// `true` on blink frames (values there are interpolated).
    pub blinks: Vec<bool>,
    pub intervals: Vec<BlinkInterval>,
}

impl PupilEstimate {
    pub fn len(&self) -> usize {
        self.diameter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diameter.is_empty()
    }

    /// Center as an `(n, 2)` array of `[x, y]` rows.
    pub fn xy_pos(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), 2), |(i, j)| {
            if j == 0 {
                self.center_x[i]
            } else {
                self.center_y[i]
            }
        })
    }

    pub fn blink_starts(&self) -> Vec<usize> {
        self.intervals.iter().map(|b| b.start).collect()
    }

    pub fn blink_stops(&self) -> Vec<usize> {
        self.intervals.iter().map(|b| b.stop).collect()
    }

    /// Median diameter over non-blink frames, NaN if every frame is a blink.
    pub fn median_open_diameter(&self) -> f64 {
        let mut open: Vec<f64> = self
            .diameter
            .iter()
            .zip(&self.blinks)
            .filter(|&(_, &b)| !b)
            .map(|(&d, _)| d)
            .collect();
        crate::stages::smooth::median_in_place(&mut open)
    }
}

/// Serializable per-file summary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineReport {
    /// Tracking file the report was built from, if loaded from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub frames: FrameCounts,
    pub height_model: HeightModel,
    /// Frames whose height came from the model.
    pub n_model_heights: usize,
    pub blinks: Vec<BlinkInterval>,
    pub blink_flags: BlinkFlagCounts,
    pub n_blink_frames: usize,
    pub median_diameter_px: f64,
    /// Set by the writer when a pixel scale is supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mm_per_px: Option<f64>,
    pub config: PipelineConfig,
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub estimate: PupilEstimate,
    pub report: PipelineReport,
}
