//! Tracker CSV fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray_npy::ReadNpyExt;

pub const BODYPARTS: [&str; 6] = [
    "leftpupil",
    "rightpupil",
    "dorsalpupil",
    "ventralpupil",
    "dorsaleyelid",
    "ventraleyelid",
];

/// One frame of an open eye; `conf` applies to every point.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub cx: f64,
    pub cy: f64,
    pub width: f64,
    pub height: f64,
    pub conf: f64,
    /// Write empty cells instead of values.
    pub missing: bool,
}

impl Frame {
    pub fn open(conf: f64) -> Self {
        Self {
            cx: 120.0,
            cy: 90.0,
            width: 24.0,
            height: 20.0,
            conf,
            missing: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::open(0.0)
        }
    }

    fn points(&self) -> [(f64, f64); 6] {
        let (cx, cy) = (self.cx, self.cy);
        let (hw, hh) = (0.5 * self.width, 0.5 * self.height);
        [
            (cx - hw, cy),
            (cx + hw, cy),
            (cx, cy - hh),
            (cx, cy + hh),
            (cx, cy - hh - 20.0),
            (cx, cy + hh + 20.0),
        ]
    }
}

fn header(bodyparts: &[&str]) -> String {
    let mut s = String::from("scorer");
    for _ in 0..bodyparts.len() * 3 {
        s.push_str(",DLC_resnet50_pupil");
    }
    s.push_str("\nbodyparts");
    for bp in bodyparts {
        for _ in 0..3 {
            let _ = write!(s, ",{}", bp);
        }
    }
    s.push_str("\ncoords");
    for _ in bodyparts {
        s.push_str(",x,y,likelihood");
    }
    s.push('\n');
    s
}

/// Tracker CSV text for the default six-point layout.
pub fn tracker_csv(frames: &[Frame]) -> String {
    let mut s = header(&BODYPARTS);
    for (i, f) in frames.iter().enumerate() {
        let _ = write!(s, "{}", i);
        for (x, y) in f.points() {
            if f.missing {
                s.push_str(",,,");
            } else {
                let _ = write!(s, ",{},{},{}", x, y, f.conf);
            }
        }
        s.push('\n');
    }
    s
}

/// Two reference points `dist` px apart in every frame.
pub fn reference_csv(n: usize, dist: f64) -> String {
    let mut s = header(&["hh1", "hh2"]);
    for i in 0..n {
        let _ = writeln!(s, "{},10,10,0.99,{},10,0.99", i, 10.0 + dist);
    }
    s
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Read an NPY file written by the crate.
pub fn read_npy<A: ReadNpyExt>(path: &Path) -> A {
    A::read_npy(File::open(path).unwrap()).unwrap()
}
