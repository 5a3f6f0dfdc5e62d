//! Blink detection: per-frame flags, dilation, and run extraction.

use crate::config::BlinkConfig;
use crate::error::Result;
use crate::stages::adjust::AdjustedTrace;
use crate::stages::smooth::{median_filter, median_in_place};
use crate::stages::validate::RawTrace;

/// Inclusive frame range `[start, stop]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlinkInterval {
    pub start: usize,
    pub stop: usize,
}

impl BlinkInterval {
    pub fn n_frames(&self) -> usize {
        self.stop - self.start + 1
    }

    pub fn contains(&self, frame: usize) -> bool {
        (self.start..=self.stop).contains(&frame)
    }
}

/// How many frames each criterion flagged, before dilation and run filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlinkFlagCounts {
    pub width_uncertain: usize,
    pub top_bottom_uncertain: usize,
    pub lids_closed: usize,
    pub center_near_lid: usize,
    pub size_drop: usize,
    pub center_jump: usize,
    pub non_finite: usize,
}

/// Blink mask and its sorted, non-overlapping intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkDetection {
    pub mask: Vec<bool>,
    pub intervals: Vec<BlinkInterval>,
    pub flags: BlinkFlagCounts,
}

impl BlinkDetection {
    pub fn starts(&self) -> Vec<usize> {
        self.intervals.iter().map(|b| b.start).collect()
    }

    pub fn stops(&self) -> Vec<usize> {
        self.intervals.iter().map(|b| b.stop).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn n_blink_frames(&self) -> usize {
        self.mask.iter().filter(|&&b| b).count()
    }
}

/// Flag blink frames on the adjusted trace and group them into intervals.
pub fn detect_blinks(
    trace: &RawTrace,
    adjusted: &AdjustedTrace,
    cfg: &BlinkConfig,
) -> Result<BlinkDetection> {
    let n = trace.len();
    let thr = trace.min_certainty;
    let mut flags = BlinkFlagCounts::default();
    let mut raw = vec![false; n];

    for (i, f) in trace.frames.iter().enumerate() {
        let p = &f.points;
        if !p.width_confident(thr) {
            mark(&mut raw, i, &mut flags.width_uncertain);
        }
        if !p.dorsal.is_confident(thr) && !p.ventral.is_confident(thr) {
            mark(&mut raw, i, &mut flags.top_bottom_uncertain);
        }
        let non_finite = !(adjusted.center_x[i].is_finite()
            && adjusted.center_y[i].is_finite()
            && adjusted.height[i].is_finite()
            && adjusted.width[i].is_finite());
        if non_finite {
            mark(&mut raw, i, &mut flags.non_finite);
        }
    }

    if trace.has_lids() {
        for i in lid_gap_outliers(trace, cfg.lid_min_std) {
            mark(&mut raw, i, &mut flags.lids_closed);
        }
        for (i, f) in trace.frames.iter().enumerate() {
            let p = &f.points;
            let cy = adjusted.center_y[i];
            let to_top = p
                .dorsal_lid
                .filter(|l| l.is_confident(thr))
                .map_or(f64::NAN, |l| cy - l.y);
            let to_bottom = p
                .ventral_lid
                .filter(|l| l.is_confident(thr))
                .map_or(f64::NAN, |l| l.y - cy);
            // `f64::min` ignores a NaN operand: nearest confident lid.
            if to_top.min(to_bottom) < cfg.min_lid_center_dist * adjusted.height[i] {
                mark(&mut raw, i, &mut flags.center_near_lid);
            }
        }
    }

    for series in [&adjusted.height, &adjusted.width] {
        let baseline = median_filter(series, cfg.baseline_window)?;
        for (i, (&v, &b)) in series.iter().zip(&baseline).enumerate() {
            if v < cfg.drop_fraction * b {
                mark(&mut raw, i, &mut flags.size_drop);
            }
        }
    }

    if let Some(max_jump) = cfg.max_center_jump {
        let mut heights: Vec<f64> = adjusted
            .height
            .iter()
            .copied()
            .filter(|h| h.is_finite())
            .collect();
        let limit = max_jump * median_in_place(&mut heights);
        let base_x = median_filter(&adjusted.center_x, cfg.jump_window)?;
        let base_y = median_filter(&adjusted.center_y, cfg.jump_window)?;
        for i in 0..n {
            let dx = adjusted.center_x[i] - base_x[i];
            let dy = adjusted.center_y[i] - base_y[i];
            if dx.hypot(dy) > limit {
                mark(&mut raw, i, &mut flags.center_jump);
            }
        }
    }

    let padded = dilate(&raw, cfg.pad_frames);
    let mut intervals = runs(&padded);
    intervals.retain(|b| {
        let truncated = b.start == 0 || b.stop + 1 == n;
        b.n_frames() >= cfg.min_blink_frames && (cfg.keep_truncated || !truncated)
    });

    let mut mask = vec![false; n];
    for b in &intervals {
        mask[b.start..=b.stop].fill(true);
        tracing::debug!("Blink frames {}..={} ({} frames)", b.start, b.stop, b.n_frames());
    }

    let detection = BlinkDetection {
        mask,
        intervals,
        flags,
    };
    tracing::info!(
        "Detected {} blinks covering {} of {} frames",
        detection.intervals.len(),
        detection.n_blink_frames(),
        n
    );
    Ok(detection)
}

fn mark(raw: &mut [bool], i: usize, counter: &mut usize) {
    *counter += 1;
    raw[i] = true;
}

/// Frames with both lids confident whose lid gap is far below the typical gap.
fn lid_gap_outliers(trace: &RawTrace, lid_min_std: f64) -> Vec<usize> {
    let thr = trace.min_certainty;
    let gaps: Vec<(usize, f64)> = trace
        .frames
        .iter()
        .enumerate()
        .filter_map(|(i, f)| {
            let (d, v) = (f.points.dorsal_lid?, f.points.ventral_lid?);
            let gap = v.y - d.y;
            (d.is_confident(thr) && v.is_confident(thr) && gap.is_finite()).then_some((i, gap))
        })
        .collect();
    if gaps.len() < 2 {
        return Vec::new();
    }

    let m = gaps.len() as f64;
    let mean = gaps.iter().map(|&(_, g)| g).sum::<f64>() / m;
    let var = gaps.iter().map(|&(_, g)| (g - mean).powi(2)).sum::<f64>() / m;
    let std = var.sqrt();
    // A flat gap series has no outliers; rounding in `mean` must not create one.
    if std <= 1e-9 * mean.abs().max(1.0) {
        return Vec::new();
    }
    let cutoff = mean - lid_min_std * std;
    gaps.into_iter()
        .filter(|&(_, g)| g < cutoff)
        .map(|(i, _)| i)
        .collect()
}

fn dilate(mask: &[bool], pad: usize) -> Vec<bool> {
    if pad == 0 {
        return mask.to_vec();
    }
    let n = mask.len();
    let mut out = vec![false; n];
    for (i, _) in mask.iter().enumerate().filter(|&(_, &b)| b) {
        let lo = i.saturating_sub(pad);
        let hi = (i + pad).min(n - 1);
        out[lo..=hi].fill(true);
    }
    out
}

fn runs(mask: &[bool]) -> Vec<BlinkInterval> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, &b) in mask.iter().enumerate() {
        match (b, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push(BlinkInterval { start: s, stop: i - 1 });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(BlinkInterval {
            start: s,
            stop: mask.len() - 1,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdjustConfig, HeightModelConfig, RingLayout};
    use crate::stages::adjust::adjust_center_height;
    use crate::stages::height_model::fit_height_model;
    use crate::stages::validate::validate_frames;
    use crate::test_utils::{constant_specs, synthetic_table, FrameSpec};
    use rand::prelude::*;

    fn detect(specs: &[FrameSpec], cfg: &BlinkConfig) -> BlinkDetection {
        let trace = validate_frames(&synthetic_table(specs), &RingLayout::default(), 0.6).unwrap();
        let model = fit_height_model(&trace, &HeightModelConfig::default()).unwrap();
        let adjusted = adjust_center_height(&trace, &model, &AdjustConfig::default());
        detect_blinks(&trace, &adjusted, cfg).unwrap()
    }

    fn assert_well_formed(d: &BlinkDetection) {
        for b in &d.intervals {
            assert!(b.start <= b.stop);
        }
        for w in d.intervals.windows(2) {
            assert!(w[0].stop + 1 < w[1].start);
        }
    }

    #[test]
    fn stable_trace_has_no_blinks() {
        let d = detect(&constant_specs(120), &BlinkConfig::default());
        assert!(d.is_empty());
        assert!(d.starts().is_empty() && d.stops().is_empty());
        assert_eq!(d.flags, BlinkFlagCounts::default());
    }

    #[test]
    fn zero_confidence_run_is_one_blink() {
        let mut specs = constant_specs(100);
        for s in &mut specs[40..=45] {
            *s = s.with_conf(0.0);
        }
        let d = detect(&specs, &BlinkConfig::default());
        assert_eq!(d.starts(), vec![40]);
        assert_eq!(d.stops(), vec![45]);
        assert_eq!(d.n_blink_frames(), 6);
        assert_eq!(d.flags.width_uncertain, 6);
    }

    #[test]
    fn padding_dilates_and_merges() {
        let mut specs = constant_specs(60);
        for k in [20, 21, 26, 27] {
            specs[k] = specs[k].with_conf(0.0);
        }
        let cfg = BlinkConfig {
            pad_frames: 2,
            ..Default::default()
        };
        let d = detect(&specs, &cfg);
        assert_eq!(d.intervals, vec![BlinkInterval { start: 18, stop: 29 }]);
        assert_well_formed(&d);
    }

    #[test]
    fn short_runs_are_dropped() {
        let mut specs = constant_specs(50);
        specs[10] = specs[10].with_conf(0.0);
        for s in &mut specs[30..33] {
            *s = s.with_conf(0.0);
        }
        let d = detect(&specs, &BlinkConfig::default());
        assert_eq!(d.intervals, vec![BlinkInterval { start: 30, stop: 32 }]);
        assert!(!d.mask[10]);
    }

    #[test]
    fn truncated_blinks_follow_config() {
        let mut specs = constant_specs(50);
        for s in &mut specs[..3] {
            *s = s.with_conf(0.0);
        }
        for s in &mut specs[47..] {
            *s = s.with_conf(0.0);
        }
        let kept = detect(&specs, &BlinkConfig::default());
        assert_eq!(kept.starts(), vec![0, 47]);
        assert_eq!(kept.stops(), vec![2, 49]);

        let cfg = BlinkConfig {
            keep_truncated: false,
            ..Default::default()
        };
        let dropped = detect(&specs, &cfg);
        assert!(dropped.is_empty());
        assert!(dropped.mask.iter().all(|&b| !b));
    }

    #[test]
    fn lid_gap_collapse_is_a_blink() {
        let mut specs = constant_specs(400);
        // Small jitter so the gap distribution has spread.
        for (i, s) in specs.iter_mut().enumerate() {
            s.lid_margin = 20.0 + if i % 2 == 0 { 0.25 } else { -0.25 };
        }
        for s in &mut specs[200..202] {
            s.lid_margin = 0.5;
        }
        let cfg = BlinkConfig {
            min_lid_center_dist: 0.0,
            ..Default::default()
        };
        let d = detect(&specs, &cfg);
        assert_eq!(d.intervals, vec![BlinkInterval { start: 200, stop: 201 }]);
        assert_eq!(d.flags.lids_closed, 2);
    }

    #[test]
    fn center_close_to_lid_is_a_blink() {
        let mut specs = constant_specs(80);
        // Lids drawn over the pupil: 7 px from the center, below half a height.
        for s in &mut specs[50..53] {
            s.lid_margin = -3.0;
        }
        let cfg = BlinkConfig {
            lid_min_std: 1e6,
            ..Default::default()
        };
        let d = detect(&specs, &cfg);
        assert_eq!(d.intervals, vec![BlinkInterval { start: 50, stop: 52 }]);
        assert_eq!(d.flags.center_near_lid, 3);
    }

    #[test]
    fn size_drop_against_rolling_median() {
        let mut specs = constant_specs(100);
        for s in &mut specs[60..64] {
            s.width = 8.0;
        }
        let cfg = BlinkConfig {
            max_center_jump: None,
            ..Default::default()
        };
        let d = detect(&specs, &cfg);
        assert_eq!(d.intervals, vec![BlinkInterval { start: 60, stop: 63 }]);
        assert!(d.flags.size_drop >= 4);
    }

    #[test]
    fn center_jump_is_flagged() {
        let mut specs = constant_specs(100);
        for s in &mut specs[70..73] {
            s.cx += 40.0;
        }
        let d = detect(&specs, &BlinkConfig::default());
        assert_eq!(d.intervals, vec![BlinkInterval { start: 70, stop: 72 }]);
        assert_eq!(d.flags.center_jump, 3);

        let cfg = BlinkConfig {
            max_center_jump: None,
            ..Default::default()
        };
        assert!(detect(&specs, &cfg).is_empty());
    }

    #[test]
    fn held_gaze_shift_is_not_a_blink() {
        let mut specs = constant_specs(400);
        let offsets = (1..=5)
            .map(|k| 5.0 * k as f64)
            .chain(std::iter::repeat(25.0).take(60))
            .chain((0..5).rev().map(|k| 5.0 * k as f64));
        for (s, dx) in specs[150..].iter_mut().zip(offsets) {
            s.cx += dx;
        }
        assert_eq!(specs[154].cx, 145.0);
        assert_eq!(specs[214].cx, 145.0);
        assert_eq!(specs[219].cx, 120.0);

        let d = detect(&specs, &BlinkConfig::default());
        assert!(d.is_empty(), "held fixation flagged: {:?}", d.intervals);
        assert_eq!(d.flags.center_jump, 0);
    }

    #[test]
    fn noisy_trace_flags_only_dropouts() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut specs: Vec<FrameSpec> = (0..2000)
            .map(|_| {
                let mut s = FrameSpec::open(
                    120.0 + rng.gen_range(-0.5..0.5),
                    90.0 + rng.gen_range(-0.5..0.5),
                    24.0 + rng.gen_range(-0.3..0.3),
                    20.0 + rng.gen_range(-0.3..0.3),
                    rng.gen_range(0.8..1.0),
                );
                s.lid_margin += rng.gen_range(-0.5..0.5);
                s
            })
            .collect();
        let dropouts = [(300, 303), (810, 816), (1500, 1502)];
        for &(a, b) in &dropouts {
            for s in &mut specs[a..=b] {
                *s = s.with_conf(rng.gen_range(0.0..0.3));
            }
        }

        let d = detect(&specs, &BlinkConfig::default());
        assert_well_formed(&d);
        let expected: Vec<BlinkInterval> = dropouts
            .iter()
            .map(|&(start, stop)| BlinkInterval { start, stop })
            .collect();
        assert_eq!(d.intervals, expected);
        assert_eq!(d.flags.center_jump, 0);
        assert_eq!(d.flags.size_drop, 0);
        assert_eq!(d.flags.lids_closed, 0);
    }

    #[test]
    fn missing_rows_are_blinks() {
        let mut specs = constant_specs(40);
        specs[12] = FrameSpec::missing();
        specs[13] = FrameSpec::missing();
        let d = detect(&specs, &BlinkConfig::default());
        assert_eq!(d.intervals, vec![BlinkInterval { start: 12, stop: 13 }]);
        assert_eq!(d.flags.non_finite, 2);
    }

    #[test]
    fn run_helpers() {
        let m = [true, true, false, true, false, false, true];
        assert_eq!(
            runs(&m),
            vec![
                BlinkInterval { start: 0, stop: 1 },
                BlinkInterval { start: 3, stop: 3 },
                BlinkInterval { start: 6, stop: 6 },
            ]
        );
        assert_eq!(dilate(&[false, false, true, false], 1), vec![false, true, true, true]);
        assert!(dilate(&[], 3).is_empty());
    }
}
