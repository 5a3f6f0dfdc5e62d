//! On-disk output contract for one processed tracking file.
//!
//! Files written into the output directory:
//! - `eye.xyPos.npy`: `float64`, shape `(n, 2)`, center x/y per frame
//! - `eye.diameter.npy`: `float64`, shape `(n,)`
//! - `eye.diameter_mm.npy`: as above in millimetres, only with a [`PixelScale`]
//! - `eye.blinks.npy`: `bool`, shape `(n,)`
//! - `xyPos_diameter_blinks.csv`: `frame, center_x, center_y, diameter, blink`
//! - `pupil_report.json`: the [`PipelineReport`]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array1;
use ndarray_npy::WriteNpyExt;

use crate::error::{PupilError, Result};
use crate::pipeline::{PipelineOutput, PipelineReport};
use crate::scale::PixelScale;

pub const XY_POS_FILE: &str = "eye.xyPos.npy";
pub const DIAMETER_FILE: &str = "eye.diameter.npy";
pub const DIAMETER_MM_FILE: &str = "eye.diameter_mm.npy";
pub const BLINKS_FILE: &str = "eye.blinks.npy";
pub const TABLE_FILE: &str = "xyPos_diameter_blinks.csv";
pub const REPORT_FILE: &str = "pupil_report.json";

/// Directory name that replaces the tracker folder in derived layouts.
const DERIVED_DIR: &str = "xyPos_diameter";

/// Where outputs for a tracking file go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// Write into this directory.
    Explicit(PathBuf),
    /// `<root>/<tracker>/<session>/<file>.csv` -> `<root>/xyPos_diameter/<session>/`.
    #[default]
    NextToTracking,
}

impl OutputLayout {
    /// Resolve the output directory for `tracking_file`.
    pub fn resolve(&self, tracking_file: &Path) -> Result<PathBuf> {
        match self {
            Self::Explicit(dir) => Ok(dir.clone()),
            Self::NextToTracking => derived_output_dir(tracking_file),
        }
    }
}

/// Derive `<root>/xyPos_diameter/<session>/` from `<root>/<tracker>/<session>/<file>`.
pub fn derived_output_dir(tracking_file: &Path) -> Result<PathBuf> {
    let session_dir = tracking_file.parent();
    let session = session_dir.and_then(Path::file_name);
    let root = session_dir.and_then(Path::parent).and_then(Path::parent);
    match (session, root) {
        (Some(session), Some(root)) => Ok(root.join(DERIVED_DIR).join(session)),
        _ => Err(PupilError::InvalidInput(format!(
            "cannot derive output directory from '{}': expected <root>/<tracker>/<session>/<file>",
            tracking_file.display()
        ))),
    }
}

/// Writer knobs.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Write NaN into blink frames of the `.npy` arrays instead of the
    /// interpolated values.
    pub mask_blinks: bool,
    /// Also write the diameter in millimetres.
    pub scale: Option<PixelScale>,
}

#[derive(serde::Serialize)]
struct TableRow {
    frame: usize,
    center_x: f64,
    center_y: f64,
    diameter: f64,
    blink: bool,
}

fn write_npy_file<A: WriteNpyExt>(path: &Path, array: &A) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    array.write_npy(&mut w)?;
    w.flush()?;
    Ok(())
}

/// Write every output file into `dir`, creating it if needed.
///
/// Returns the written paths in write order.
pub fn write_outputs(
    output: &PipelineOutput,
    dir: &Path,
    opts: &WriteOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let est = &output.estimate;
    let n = est.len();
    let mut written = Vec::new();

    let mut xy = est.xy_pos();
    let mut diameter = Array1::from_vec(est.diameter.clone());
    if opts.mask_blinks {
        for (i, _) in est.blinks.iter().enumerate().filter(|&(_, &b)| b) {
            xy.row_mut(i).fill(f64::NAN);
            diameter[i] = f64::NAN;
        }
    }

    let path = dir.join(XY_POS_FILE);
    write_npy_file(&path, &xy)?;
    written.push(path);

    let path = dir.join(DIAMETER_FILE);
    write_npy_file(&path, &diameter)?;
    written.push(path);

    if let Some(scale) = &opts.scale {
        let mm = diameter.mapv(|d| scale.to_mm(d));
        let path = dir.join(DIAMETER_MM_FILE);
        write_npy_file(&path, &mm)?;
        written.push(path);
    }

    let path = dir.join(BLINKS_FILE);
    write_npy_file(&path, &Array1::from_vec(est.blinks.clone()))?;
    written.push(path);

    let path = dir.join(TABLE_FILE);
    let mut wtr = csv::Writer::from_path(&path)?;
    for i in 0..n {
        wtr.serialize(TableRow {
            frame: i,
            center_x: est.center_x[i],
            center_y: est.center_y[i],
            diameter: est.diameter[i],
            blink: est.blinks[i],
        })?;
    }
    wtr.flush()?;
    written.push(path);

    let report = PipelineReport {
        mm_per_px: opts.scale.map(|s| s.mm_per_px),
        ..output.report.clone()
    };
    let path = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, json)?;
    written.push(path);

    tracing::info!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}
