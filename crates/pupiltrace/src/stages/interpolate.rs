//! Fill blink intervals and non-finite frames by linear interpolation.

use crate::config::DiameterFormula;
use crate::error::{PupilError, Result};
use crate::pipeline::PupilEstimate;
use crate::stages::blink::BlinkDetection;
use crate::stages::smooth::SmoothedTrace;

/// Replace every bad sample (inside a blink, or non-finite) by linear
/// interpolation between the nearest anchors on either side.
///
/// An anchor is a finite sample outside every blink whose frame passed
/// validation (`valid[i]`). Frames that are neither bad nor anchors keep
/// their value. Gaps touching either end hold the nearest anchor value.
pub fn fill_gaps(
    series: &[f64],
    blink_mask: &[bool],
    valid: &[bool],
    name: &'static str,
) -> Result<Vec<f64>> {
    debug_assert_eq!(series.len(), blink_mask.len());
    debug_assert_eq!(series.len(), valid.len());
    if series.is_empty() {
        return Ok(Vec::new());
    }
    let bad = |i: usize| blink_mask[i] || !series[i].is_finite();
    let anchors: Vec<usize> = (0..series.len())
        .filter(|&i| !bad(i) && valid[i])
        .collect();
    let (Some(&first), Some(&last)) = (anchors.first(), anchors.last()) else {
        return Err(PupilError::NoAnchors { series: name });
    };

    let mut out = series.to_vec();
    for i in (0..first).chain(last + 1..series.len()).filter(|&i| bad(i)) {
        out[i] = if i < first { series[first] } else { series[last] };
    }
    for pair in anchors.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (va, vb) = (series[a], series[b]);
        let span = (b - a) as f64;
        for i in (a + 1..b).filter(|&i| bad(i)) {
            let t = (i - a) as f64 / span;
            out[i] = va + t * (vb - va);
        }
    }
    Ok(out)
}

/// Build the final estimate from the smoothed trace and the blink mask.
///
/// `valid` marks frames that passed validation; only those anchor a gap.
pub fn interpolate_blinks(
    smoothed: &SmoothedTrace,
    blinks: &BlinkDetection,
    valid: &[bool],
    formula: DiameterFormula,
) -> Result<PupilEstimate> {
    let diameter: Vec<f64> = smoothed
        .width
        .iter()
        .zip(&smoothed.height)
        .map(|(&w, &h)| formula.apply(w, h))
        .collect();

    let mask = &blinks.mask;
    let filled = mask
        .iter()
        .zip(&diameter)
        .filter(|&(&b, d)| b || !d.is_finite())
        .count();

    let estimate = PupilEstimate {
        center_x: fill_gaps(&smoothed.center_x, mask, valid, "center_x")?,
        center_y: fill_gaps(&smoothed.center_y, mask, valid, "center_y")?,
        diameter: fill_gaps(&diameter, mask, valid, "diameter")?,
        blinks: mask.clone(),
        intervals: blinks.intervals.clone(),
    };
    tracing::info!("Interpolated {} of {} frames", filled, estimate.len());
    Ok(estimate)
}
