//! Robust regression of pupil height on width and horizontal position.
//!
//! The lower boundary point drifts upward when the eyelid covers it, so raw
//! height underestimates the pupil. Width and horizontal offset stay reliable;
//! a model fitted on fully confident frames recovers the open-eye height.

use nalgebra::{DMatrix, DVector};

use crate::config::{HeightModelConfig, HeightModelKind};
use crate::error::{PupilError, Result};
use crate::stages::validate::RawTrace;

/// Relative spread below which a regressor is treated as constant.
const MIN_REL_SPREAD: f64 = 1e-9;
const CONVERGENCE_TOL: f64 = 1e-9;

/// Fitted height model. Immutable once fitted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeightModel {
    pub kind: HeightModelKind,
    /// One slope per regressor, see [`HeightModel::regressor_names`].
    /// Regressors that were constant over the fit frames have slope 0.
    pub slopes: Vec<f64>,
    pub intercept: f64,
    /// Number of valid frames used.
    pub n_frames: usize,
    /// Unweighted RMS residual (px) over the fit frames.
    pub rms_residual: f64,
    /// Reweighting iterations performed.
    pub iterations: usize,
}

impl HeightModel {
    /// Predicted height for one frame. NaN geometry yields NaN.
    pub fn predict(&self, width: f64, center_x: f64) -> f64 {
        let feats = regressors(self.kind, width, center_x);
        self.intercept
            + feats
                .iter()
                .zip(&self.slopes)
                .map(|(f, s)| f * s)
                .sum::<f64>()
    }

    pub fn regressor_names(&self) -> &'static [&'static str] {
        match self.kind {
            HeightModelKind::Linear => &["width", "center_x"],
            HeightModelKind::Quadratic => &[
                "width",
                "center_x",
                "width^2",
                "center_x^2",
                "width*center_x",
            ],
        }
    }
}

fn regressors(kind: HeightModelKind, width: f64, center_x: f64) -> Vec<f64> {
    match kind {
        HeightModelKind::Linear => vec![width, center_x],
        HeightModelKind::Quadratic => vec![
            width,
            center_x,
            width * width,
            center_x * center_x,
            width * center_x,
        ],
    }
}

#[inline]
fn huber_weight(abs_r: f64, delta: f64) -> f64 {
    if abs_r <= delta {
        1.0
    } else {
        delta / abs_r
    }
}

/// Fit the height model on valid frames with Huber-weighted IRLS.
pub fn fit_height_model(trace: &RawTrace, cfg: &HeightModelConfig) -> Result<HeightModel> {
    let (rows, heights): (Vec<Vec<f64>>, Vec<f64>) = trace
        .frames
        .iter()
        .filter(|f| f.valid())
        .map(|f| (regressors(cfg.kind, f.width, f.center_x), f.height))
        .unzip();

    let n = heights.len();
    if n == 0 {
        return Err(PupilError::NoValidFrames);
    }
    if n < cfg.min_valid_frames {
        return Err(PupilError::InsufficientData {
            needed: cfg.min_valid_frames,
            got: n,
        });
    }

    let delta = cfg.huber_delta_px.max(1e-6);
    let mut weights = vec![1.0; n];
    let (mut slopes, mut intercept) = weighted_least_squares(&rows, &heights, &weights);
    let mut iterations = 1;

    while iterations < cfg.max_iters {
        for (w, (row, &h)) in weights.iter_mut().zip(rows.iter().zip(&heights)) {
            let r = h - linear_eval(row, &slopes, intercept);
            *w = huber_weight(r.abs(), delta);
        }
        let (next_slopes, next_intercept) = weighted_least_squares(&rows, &heights, &weights);
        iterations += 1;

        let converged = next_slopes
            .iter()
            .zip(&slopes)
            .chain(std::iter::once((&next_intercept, &intercept)))
            .all(|(a, b)| (a - b).abs() <= CONVERGENCE_TOL * (1.0 + b.abs()));
        slopes = next_slopes;
        intercept = next_intercept;
        if converged {
            break;
        }
    }

    let sum_sq: f64 = rows
        .iter()
        .zip(&heights)
        .map(|(row, &h)| {
            let r = h - linear_eval(row, &slopes, intercept);
            r * r
        })
        .sum();
    let model = HeightModel {
        kind: cfg.kind,
        slopes,
        intercept,
        n_frames: n,
        rms_residual: (sum_sq / n as f64).sqrt(),
        iterations,
    };

    tracing::info!(
        "Height model ({:?}) over {} frames: slopes={:?} intercept={:.3} rms={:.3}px ({} iters)",
        model.kind,
        model.n_frames,
        model.slopes,
        model.intercept,
        model.rms_residual,
        model.iterations
    );
    Ok(model)
}

fn linear_eval(row: &[f64], slopes: &[f64], intercept: f64) -> f64 {
    intercept + row.iter().zip(slopes).map(|(x, s)| x * s).sum::<f64>()
}

/// Weighted least squares on standardized regressors.
///
/// Constant regressors are dropped (slope 0). A light ridge keeps collinear
/// regressor sets solvable.
fn weighted_least_squares(rows: &[Vec<f64>], y: &[f64], w: &[f64]) -> (Vec<f64>, f64) {
    let p = rows.first().map_or(0, Vec::len);
    let w_sum: f64 = w.iter().sum();
    let mean_y = rows
        .iter()
        .zip(y)
        .zip(w)
        .map(|((_, &yi), &wi)| wi * yi)
        .sum::<f64>()
        / w_sum;

    let mut mean_x = vec![0.0; p];
    for (row, &wi) in rows.iter().zip(w) {
        for (m, &x) in mean_x.iter_mut().zip(row) {
            *m += wi * x;
        }
    }
    for m in &mut mean_x {
        *m /= w_sum;
    }

    // (index, std) of regressors with usable spread.
    let active: Vec<(usize, f64)> = (0..p)
        .filter_map(|j| {
            let var = rows
                .iter()
                .zip(w)
                .map(|(row, &wi)| wi * (row[j] - mean_x[j]).powi(2))
                .sum::<f64>()
                / w_sum;
            let sd = var.sqrt();
            (sd > MIN_REL_SPREAD * mean_x[j].abs().max(1.0)).then_some((j, sd))
        })
        .collect();

    let mut slopes = vec![0.0; p];
    if !active.is_empty() {
        let k = active.len();
        let mut a = DMatrix::<f64>::zeros(k, k);
        let mut b = DVector::<f64>::zeros(k);
        for ((row, &yi), &wi) in rows.iter().zip(y).zip(w) {
            let xs = DVector::<f64>::from_iterator(
                k,
                active.iter().map(|&(j, sd)| (row[j] - mean_x[j]) / sd),
            );
            a += wi * (&xs * xs.transpose());
            b += wi * (yi - mean_y) * xs;
        }
        a += DMatrix::<f64>::identity(k, k) * (1e-9 * w_sum);

        if let Some(beta) = a.lu().solve(&b) {
            if beta.iter().all(|v| v.is_finite()) {
                for (&(j, sd), &v) in active.iter().zip(beta.iter()) {
                    slopes[j] = v / sd;
                }
            }
        }
    }

    let intercept = mean_y
        - slopes
            .iter()
            .zip(&mean_x)
            .map(|(s, m)| s * m)
            .sum::<f64>();
    (slopes, intercept)
}
