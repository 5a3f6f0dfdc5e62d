//! pupiltrace: pupil diameter and center traces from keypoint tracking output.
//!
//! Input is the per-frame CSV of a pose tracker that follows a ring of points
//! on the pupil boundary (plus, optionally, the eyelids). The pipeline stages
//! are:
//!
//! 1. **Validate** – raw width/height/center per frame, validity by the
//!    minimum point confidence.
//! 2. **Height model** – robust (Huber IRLS) regression of height on width
//!    and horizontal center, fitted on valid frames only.
//! 3. **Adjust** – replace per-frame height with the model height and
//!    recenter vertically from the trusted side.
//! 4. **Blinks** – threshold criteria, dilation and run-length filtering.
//! 5. **Smooth** – centered running median.
//! 6. **Interpolate** – linear fill of blink intervals, hold at the edges.
//!
//! # Public API
//! - [`PupilEstimator`] as the primary entry point
//! - [`PipelineConfig`] and its sections for tuning
//! - [`write_outputs`] / [`OutputLayout`] for the on-disk contract
//! - [`PixelScale`] for millimetre conversion
//!
//! The per-stage functions are public under [`stages`] for callers that want
//! intermediate results.

mod api;
mod config;
mod error;
mod keypoints;
mod output;
mod pipeline;
mod scale;
pub mod stages;
#[cfg(test)]
mod test_utils;
mod tracking_csv;

pub use api::PupilEstimator;
pub use config::{
    AdjustConfig, BlinkConfig, DiameterFormula, HeightAdjustPolicy, HeightModelConfig,
    HeightModelKind, PipelineConfig, RingLayout, VerticalAnchor,
};
pub use error::{PupilError, Result};
pub use keypoints::{KeypointSample, KeypointTable, KeypointTrack};
pub use output::{
    derived_output_dir, write_outputs, OutputLayout, WriteOptions, BLINKS_FILE, DIAMETER_FILE,
    DIAMETER_MM_FILE, REPORT_FILE, TABLE_FILE, XY_POS_FILE,
};
pub use pipeline::{run_pipeline, PipelineOutput, PipelineReport, PupilEstimate};
pub use scale::PixelScale;
pub use stages::blink::{BlinkDetection, BlinkInterval};
pub use stages::height_model::HeightModel;
pub use stages::validate::{FrameCounts, FrameStatus};
