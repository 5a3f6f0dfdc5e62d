//! Centered running median over the adjusted trace.

use crate::config::check_odd_span;
use crate::error::Result;
use crate::stages::adjust::AdjustedTrace;

/// Median-filtered geometry, aligned to the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedTrace {
    pub center_x: Vec<f64>,
    pub center_y: Vec<f64>,
    pub height: Vec<f64>,
    pub width: Vec<f64>,
}

impl SmoothedTrace {
    pub fn len(&self) -> usize {
        self.center_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.center_x.is_empty()
    }
}

/// Centered median filter with a symmetric shrinking window at the edges.
///
/// Sample `i` uses half-width `min(span / 2, i, n - 1 - i)`. Non-finite values
/// are skipped; a window with no finite value yields NaN. With an even number
/// of finite values the two middle ones are averaged.
pub fn median_filter(values: &[f64], span: usize) -> Result<Vec<f64>> {
    check_odd_span("median span", span)?;
    let n = values.len();
    let half = span / 2;
    let mut window: Vec<f64> = Vec::with_capacity(span);
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let h = half.min(i).min(n - 1 - i);
        window.clear();
        window.extend(values[i - h..=i + h].iter().copied().filter(|v| v.is_finite()));
        out.push(median_in_place(&mut window));
    }
    Ok(out)
}

pub(crate) fn median_in_place(values: &mut [f64]) -> f64 {
    let m = values.len();
    if m == 0 {
        return f64::NAN;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    if m % 2 == 1 {
        values[m / 2]
    } else {
        0.5 * (values[m / 2 - 1] + values[m / 2])
    }
}

/// Smooth each adjusted series independently.
pub fn smooth_trace(adjusted: &AdjustedTrace, span: usize) -> Result<SmoothedTrace> {
    let smoothed = SmoothedTrace {
        center_x: median_filter(&adjusted.center_x, span)?,
        center_y: median_filter(&adjusted.center_y, span)?,
        height: median_filter(&adjusted.height, span)?,
        width: median_filter(&adjusted.width, span)?,
    };
    tracing::debug!("Smoothed {} frames with span {}", smoothed.len(), span);
    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PupilError;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    #[test]
    fn constant_input_is_unchanged() {
        let v = vec![3.25; 17];
        assert_eq!(median_filter(&v, 5).unwrap(), v);
        assert_eq!(median_filter(&v, 1).unwrap(), v);
    }

    #[test]
    fn removes_isolated_spike() {
        let mut v = vec![1.0; 11];
        v[5] = 100.0;
        let out = median_filter(&v, 3).unwrap();
        assert!(out.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn edges_use_shrinking_window() {
        let v = [10.0, 0.0, 5.0, 7.0, 9.0];
        let out = median_filter(&v, 5).unwrap();
        // i=0: h=0; i=1: h=1 -> [10, 0, 5]; i=2: h=2 -> all five.
        assert_eq!(out[0], 10.0);
        assert_eq!(out[1], 5.0);
        assert_eq!(out[2], 7.0);
        assert_eq!(out[4], 9.0);
    }

    #[test]
    fn nan_is_skipped_and_even_count_averages() {
        let v = [1.0, f64::NAN, 3.0, 4.0, 8.0];
        let out = median_filter(&v, 3).unwrap();
        // i=1: [1, 3] -> 2; i=2: [3, 4] -> 3.5.
        assert_relative_eq!(out[1], 2.0);
        assert_relative_eq!(out[2], 3.5);
        let all_nan = median_filter(&[f64::NAN; 3], 3).unwrap();
        assert!(all_nan.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn output_stays_within_window_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let v: Vec<f64> = (0..200).map(|_| rng.gen_range(-5.0..5.0)).collect();
        let out = median_filter(&v, 7).unwrap();
        for i in 0..v.len() {
            let h = 3usize.min(i).min(v.len() - 1 - i);
            let w = &v[i - h..=i + h];
            let lo = w.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(out[i] >= lo && out[i] <= hi);
        }
    }

    #[test]
    fn even_or_zero_span_is_rejected() {
        for span in [0, 4] {
            assert!(matches!(
                median_filter(&[1.0, 2.0], span),
                Err(PupilError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(median_filter(&[], 5).unwrap().is_empty());
    }
}
