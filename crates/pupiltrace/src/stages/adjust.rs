//! Replace per-frame height with the model height and recenter vertically.

use crate::config::{AdjustConfig, HeightAdjustPolicy, VerticalAnchor};
use crate::stages::height_model::HeightModel;
use crate::stages::validate::{FrameRecord, RawTrace};

/// Adjusted per-frame geometry, aligned to the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedTrace {
    pub center_x: Vec<f64>,
    pub center_y: Vec<f64>,
    /// Non-negative, or NaN where the frame geometry is missing.
    pub height: Vec<f64>,
    /// Raw width, carried for blink detection and diameter formulas.
    pub width: Vec<f64>,
    /// Frames whose height came from the model.
    pub model_applied: Vec<bool>,
}

impl AdjustedTrace {
    pub fn len(&self) -> usize {
        self.center_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.center_x.is_empty()
    }

    pub fn n_model_heights(&self) -> usize {
        self.model_applied.iter().filter(|&&m| m).count()
    }
}

/// Recompute height and vertical center for every frame.
pub fn adjust_center_height(
    trace: &RawTrace,
    model: &HeightModel,
    cfg: &AdjustConfig,
) -> AdjustedTrace {
    let n = trace.len();
    let mut out = AdjustedTrace {
        center_x: Vec::with_capacity(n),
        center_y: Vec::with_capacity(n),
        height: Vec::with_capacity(n),
        width: Vec::with_capacity(n),
        model_applied: Vec::with_capacity(n),
    };

    for f in &trace.frames {
        let use_model = match cfg.policy {
            HeightAdjustPolicy::AllFrames => true,
            HeightAdjustPolicy::Occluded {
                max_lid_distance_px,
            } => vertical_extent_unreliable(f, trace.min_certainty, max_lid_distance_px),
        };
        let height = if use_model {
            model.predict(f.width, f.center_x)
        } else {
            f.height
        };
        let height = if height.is_finite() {
            height.max(0.0)
        } else {
            f64::NAN
        };

        out.center_y
            .push(recenter(f, height, cfg.anchor, trace.min_certainty));
        out.center_x.push(f.center_x);
        out.height.push(height);
        out.width.push(f.width);
        out.model_applied.push(use_model);
    }

    tracing::info!(
        "Adjusted {} frames ({} with model height)",
        out.len(),
        out.n_model_heights()
    );
    out
}

/// Width is confident but the top/bottom pair is not: one side is uncertain or
/// an eyelid is close to the pupil.
fn vertical_extent_unreliable(f: &FrameRecord, min_certainty: f64, max_lid_distance: f64) -> bool {
    let p = &f.points;
    if !p.width_confident(min_certainty) {
        return false;
    }
    let top_ok = p.dorsal.is_confident(min_certainty);
    let bottom_ok = p.ventral.is_confident(min_certainty);
    let lid_near_top = p
        .dorsal_lid
        .is_some_and(|lid| p.dorsal.y - lid.y < max_lid_distance);
    let lid_near_bottom = p
        .ventral_lid
        .is_some_and(|lid| lid.y - p.ventral.y < max_lid_distance);
    top_ok != bottom_ok || lid_near_top || lid_near_bottom
}

fn recenter(f: &FrameRecord, height: f64, anchor: VerticalAnchor, min_certainty: f64) -> f64 {
    let p = &f.points;
    let from_top = p.dorsal.y + 0.5 * height;
    let from_bottom = p.ventral.y - 0.5 * height;
    match anchor {
        VerticalAnchor::ConfidentSide => {
            let only_top = p.dorsal.is_confident(min_certainty) && !p.ventral.is_confident(min_certainty);
            if only_top {
                from_top
            } else {
                from_bottom
            }
        }
        VerticalAnchor::Dorsal => from_top,
        VerticalAnchor::Ventral => from_bottom,
        VerticalAnchor::Symmetric => 0.5 * (p.dorsal.y + p.ventral.y),
    }
}
