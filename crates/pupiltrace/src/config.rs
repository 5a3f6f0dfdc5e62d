use std::path::Path;

use crate::error::{PupilError, Result};

/// Bodypart names that play the pupil-ring and eyelid roles in the tracker output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RingLayout {
    /// Leftmost pupil boundary point.
    pub left: String,
    /// Rightmost pupil boundary point.
    pub right: String,
    /// Top (dorsal) pupil boundary point.
    pub dorsal: String,
    /// Bottom (ventral) pupil boundary point.
    pub ventral: String,
    /// Upper eyelid point, if tracked.
    pub dorsal_lid: Option<String>,
    /// Lower eyelid point, if tracked.
    pub ventral_lid: Option<String>,
}

impl Default for RingLayout {
    fn default() -> Self {
        Self {
            left: "leftpupil".to_string(),
            right: "rightpupil".to_string(),
            dorsal: "dorsalpupil".to_string(),
            ventral: "ventralpupil".to_string(),
            dorsal_lid: Some("dorsaleyelid".to_string()),
            ventral_lid: Some("ventraleyelid".to_string()),
        }
    }
}

impl RingLayout {
    /// Layout without eyelid roles.
    pub fn pupil_only() -> Self {
        Self {
            dorsal_lid: None,
            ventral_lid: None,
            ..Self::default()
        }
    }
}

/// Regressors used by the height model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightModelKind {
    /// `height ≈ a·width + b·center_x + c`.
    #[default]
    Linear,
    /// Linear terms plus `width²`, `center_x²` and `width·center_x`.
    Quadratic,
}

/// Robust regression settings for the height model.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeightModelConfig {
    pub kind: HeightModelKind,
    /// Minimum number of valid frames required to fit.
    pub min_valid_frames: usize,
    /// Huber delta (px) used for residual reweighting.
    pub huber_delta_px: f64,
    /// Maximum reweighting iterations.
    pub max_iters: usize,
}

impl Default for HeightModelConfig {
    fn default() -> Self {
        Self {
            kind: HeightModelKind::Linear,
            min_valid_frames: 3,
            huber_delta_px: 2.0,
            max_iters: 20,
        }
    }
}

/// Which frames receive the model height.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightAdjustPolicy {
    /// Every frame uses the model height.
    #[default]
    AllFrames,
    /// Only frames with an occluded or unreliable vertical extent use the model
    /// height; the others keep the raw height.
    Occluded {
        /// An eyelid closer than this (px) to the pupil counts as occluding.
        max_lid_distance_px: f64,
    },
}

/// Which pupil boundary point stays fixed when the height is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAnchor {
    /// Keep the bottom point unless only the top point is confident.
    #[default]
    ConfidentSide,
    /// Keep the top point and extend downward.
    Dorsal,
    /// Keep the bottom point and extend upward.
    Ventral,
    /// Midpoint of top and bottom points.
    Symmetric,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AdjustConfig {
    pub policy: HeightAdjustPolicy,
    pub anchor: VerticalAnchor,
}

/// Blink detection thresholds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Eyelid gap below `mean - lid_min_std * std` counts as closed.
    pub lid_min_std: f64,
    /// Center closer than this many pupil heights to an eyelid counts as a blink.
    pub min_lid_center_dist: f64,
    /// Height or width below this fraction of the rolling median counts as a drop.
    pub drop_fraction: f64,
    /// Rolling-median window (frames, odd) for the drop baseline.
    pub baseline_window: usize,
    /// Largest allowed distance of the center from its `jump_window` rolling
    /// median, in median pupil heights. `None` disables.
    ///
    /// Only excursions shorter than half the window register; a gaze shift
    /// that is held for longer moves the median along with it.
    pub max_center_jump: Option<f64>,
    /// Rolling-median window (frames, odd) for the center jump test.
    pub jump_window: usize,
    /// Frames added on each side of every flagged frame.
    pub pad_frames: usize,
    /// Runs shorter than this are treated as noise.
    pub min_blink_frames: usize,
    /// Keep blinks that touch the first or last frame.
    pub keep_truncated: bool,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            lid_min_std: 7.0,
            min_lid_center_dist: 0.5,
            drop_fraction: 0.5,
            baseline_window: 151,
            max_center_jump: Some(1.0),
            jump_window: 7,
            pad_frames: 0,
            min_blink_frames: 2,
            keep_truncated: true,
        }
    }
}

/// How the final diameter is derived from the smoothed geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiameterFormula {
    /// Adjusted height.
    #[default]
    Height,
    /// Raw width.
    Width,
    /// Arithmetic mean of width and adjusted height.
    Mean,
    /// Geometric mean of width and adjusted height.
    Geometric,
}

impl DiameterFormula {
    pub fn uses_width(self) -> bool {
        !matches!(self, Self::Height)
    }

    /// Combine one frame's width and height. Negative inputs are clamped to 0;
    /// NaN passes through.
    pub fn apply(self, width: f64, height: f64) -> f64 {
        let clamp = |v: f64| if v < 0.0 { 0.0 } else { v };
        let (w, h) = (clamp(width), clamp(height));
        match self {
            Self::Height => h,
            Self::Width => w,
            Self::Mean => 0.5 * (w + h),
            Self::Geometric => (w * h).sqrt(),
        }
    }
}

/// Full pipeline configuration for one tracking file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Likelihood a point must exceed to count as confident, in [0, 1].
    pub min_certainty: f64,
    /// Median filter span in frames (positive, odd).
    pub smooth_span: usize,
    pub layout: RingLayout,
    pub height_model: HeightModelConfig,
    pub adjust: AdjustConfig,
    pub blink: BlinkConfig,
    pub diameter: DiameterFormula,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_certainty: 0.6,
            smooth_span: 5,
            layout: RingLayout::default(),
            height_model: HeightModelConfig::default(),
            adjust: AdjustConfig::default(),
            blink: BlinkConfig::default(),
            diameter: DiameterFormula::Height,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values before any stage runs.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_certainty) {
            return Err(invalid(format!(
                "min_certainty must be in [0, 1], got {}",
                self.min_certainty
            )));
        }
        check_odd_span("smooth_span", self.smooth_span)?;

        let hm = &self.height_model;
        if hm.min_valid_frames == 0 {
            return Err(invalid("height_model.min_valid_frames must be >= 1"));
        }
        if !(hm.huber_delta_px.is_finite() && hm.huber_delta_px > 0.0) {
            return Err(invalid(format!(
                "height_model.huber_delta_px must be positive, got {}",
                hm.huber_delta_px
            )));
        }
        if hm.max_iters == 0 {
            return Err(invalid("height_model.max_iters must be >= 1"));
        }

        if let HeightAdjustPolicy::Occluded {
            max_lid_distance_px,
        } = self.adjust.policy
        {
            if !(max_lid_distance_px.is_finite() && max_lid_distance_px >= 0.0) {
                return Err(invalid(format!(
                    "adjust.policy.max_lid_distance_px must be >= 0, got {}",
                    max_lid_distance_px
                )));
            }
        }

        let b = &self.blink;
        if !(b.lid_min_std.is_finite() && b.lid_min_std >= 0.0) {
            return Err(invalid("blink.lid_min_std must be >= 0"));
        }
        if !(b.min_lid_center_dist.is_finite() && b.min_lid_center_dist >= 0.0) {
            return Err(invalid("blink.min_lid_center_dist must be >= 0"));
        }
        if !(0.0..=1.0).contains(&b.drop_fraction) {
            return Err(invalid(format!(
                "blink.drop_fraction must be in [0, 1], got {}",
                b.drop_fraction
            )));
        }
        check_odd_span("blink.baseline_window", b.baseline_window)?;
        check_odd_span("blink.jump_window", b.jump_window)?;
        if let Some(jump) = b.max_center_jump {
            if !(jump.is_finite() && jump > 0.0) {
                return Err(invalid(format!(
                    "blink.max_center_jump must be positive, got {}",
                    jump
                )));
            }
        }
        if b.min_blink_frames == 0 {
            return Err(invalid("blink.min_blink_frames must be >= 1"));
        }
        Ok(())
    }
}

pub(crate) fn check_odd_span(name: &str, span: usize) -> Result<()> {
    if span == 0 || span % 2 == 0 {
        return Err(invalid(format!(
            "{} must be a positive odd integer, got {}",
            name, span
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> PupilError {
    PupilError::InvalidConfig(msg.into())
}
