//! Top-level orchestrator for one keypoint table.

use super::result::{PipelineOutput, PipelineReport};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::keypoints::KeypointTable;
use crate::stages::adjust::adjust_center_height;
use crate::stages::blink::detect_blinks;
use crate::stages::height_model::fit_height_model;
use crate::stages::interpolate::interpolate_blinks;
use crate::stages::smooth::smooth_trace;
use crate::stages::validate::validate_frames;

/// Run every stage in order on an in-memory table.
///
/// The config is validated first; any stage error aborts the run and nothing
/// is returned for the file.
pub fn run_pipeline(table: &KeypointTable, config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;

    let trace = validate_frames(table, &config.layout, config.min_certainty)?;
    let model = fit_height_model(&trace, &config.height_model)?;
    let adjusted = adjust_center_height(&trace, &model, &config.adjust);
    let blinks = detect_blinks(&trace, &adjusted, &config.blink)?;
    let smoothed = smooth_trace(&adjusted, config.smooth_span)?;
    let valid: Vec<bool> = trace.frames.iter().map(|f| f.valid()).collect();
    let estimate = interpolate_blinks(&smoothed, &blinks, &valid, config.diameter)?;

    let report = PipelineReport {
        source: None,
        frames: trace.counts(),
        height_model: model,
        n_model_heights: adjusted.n_model_heights(),
        blinks: blinks.intervals.clone(),
        blink_flags: blinks.flags,
        n_blink_frames: blinks.n_blink_frames(),
        median_diameter_px: estimate.median_open_diameter(),
        mm_per_px: None,
        config: config.clone(),
    };
    Ok(PipelineOutput { estimate, report })
}
