//! Synthetic keypoint traces for unit tests.

use crate::config::RingLayout;
use crate::keypoints::{KeypointSample, KeypointTable, KeypointTrack};

/// Geometry and per-point confidence of one synthetic frame.
///
/// Pupil points sit on the axis-aligned extremes of a `width` x `height`
/// ellipse at `(cx, cy)`; eyelids sit `lid_margin` px beyond top and bottom.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameSpec {
    pub cx: f64,
    pub cy: f64,
    pub width: f64,
    pub height: f64,
    pub lid_margin: f64,
    pub conf_left: f64,
    pub conf_right: f64,
    pub conf_dorsal: f64,
    pub conf_ventral: f64,
    pub conf_dorsal_lid: f64,
    pub conf_ventral_lid: f64,
    pub missing: bool,
}

impl FrameSpec {
    pub fn open(cx: f64, cy: f64, width: f64, height: f64, conf: f64) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
            lid_margin: height,
            conf_left: conf,
            conf_right: conf,
            conf_dorsal: conf,
            conf_ventral: conf,
            conf_dorsal_lid: conf,
            conf_ventral_lid: conf,
            missing: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::open(0.0, 0.0, 0.0, 0.0, 0.0)
        }
    }

    pub fn with_conf(mut self, conf: f64) -> Self {
        self.conf_left = conf;
        self.conf_right = conf;
        self.conf_dorsal = conf;
        self.conf_ventral = conf;
        self.conf_dorsal_lid = conf;
        self.conf_ventral_lid = conf;
        self
    }

    fn samples(&self) -> [KeypointSample; 6] {
        if self.missing {
            return [KeypointSample::MISSING; 6];
        }
        let (hw, hh) = (0.5 * self.width, 0.5 * self.height);
        [
            KeypointSample::new(self.cx - hw, self.cy, self.conf_left),
            KeypointSample::new(self.cx + hw, self.cy, self.conf_right),
            KeypointSample::new(self.cx, self.cy - hh, self.conf_dorsal),
            KeypointSample::new(self.cx, self.cy + hh, self.conf_ventral),
            KeypointSample::new(self.cx, self.cy - hh - self.lid_margin, self.conf_dorsal_lid),
            KeypointSample::new(self.cx, self.cy + hh + self.lid_margin, self.conf_ventral_lid),
        ]
    }
}

/// Build a table with the default layout's bodypart names.
pub(crate) fn synthetic_table(frames: &[FrameSpec]) -> KeypointTable {
    let layout = RingLayout::default();
    let names = [
        layout.left,
        layout.right,
        layout.dorsal,
        layout.ventral,
        layout.dorsal_lid.unwrap_or_default(),
        layout.ventral_lid.unwrap_or_default(),
    ];
    let rows: Vec<[KeypointSample; 6]> = frames.iter().map(FrameSpec::samples).collect();
    let tracks = names
        .into_iter()
        .enumerate()
        .map(|(k, name)| KeypointTrack::new(name, rows.iter().map(|r| r[k]).collect()))
        .collect();
    KeypointTable::new(tracks).expect("synthetic tracks share one length")
}

/// `n` identical open-eye frames.
pub(crate) fn constant_specs(n: usize) -> Vec<FrameSpec> {
    vec![FrameSpec::open(120.0, 90.0, 24.0, 20.0, 0.95); n]
}
