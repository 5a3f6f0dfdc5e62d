//! Pixel-to-millimetre scale from a reference object of known size.

use std::path::Path;

use crate::error::{PupilError, Result};
use crate::keypoints::KeypointTable;
use crate::stages::smooth::median_in_place;

/// Linear scale derived from two tracked reference points a fixed physical
/// distance apart (e.g. head-plate markers).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelScale {
    pub mm_per_px: f64,
    /// Median reference distance in pixels.
    pub reference_px: f64,
    /// Spread of the reference distance (population std, pixels).
    pub reference_std_px: f64,
    pub reference_mm: f64,
    /// Frames where both reference points were finite.
    pub n_frames: usize,
}

impl PixelScale {
    /// Physical size of the standard reference object.
    pub const DEFAULT_REFERENCE_MM: f64 = 4.0;

    /// Scale from the median distance between bodyparts `a` and `b`.
    pub fn from_reference_table(
        table: &KeypointTable,
        a: &str,
        b: &str,
        size_mm: f64,
    ) -> Result<Self> {
        if !(size_mm.is_finite() && size_mm > 0.0) {
            return Err(PupilError::InvalidConfig(format!(
                "reference size must be positive, got {} mm",
                size_mm
            )));
        }
        let pa = table.require(a)?;
        let pb = table.require(b)?;

        let mut dists: Vec<f64> = pa
            .iter()
            .zip(pb)
            .map(|(p, q)| (q.x - p.x).hypot(q.y - p.y))
            .filter(|d| d.is_finite())
            .collect();
        if dists.is_empty() {
            return Err(PupilError::InsufficientData { needed: 1, got: 0 });
        }

        let n = dists.len();
        let mean = dists.iter().sum::<f64>() / n as f64;
        let std = (dists.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        let median = median_in_place(&mut dists);
        if median <= 0.0 {
            return Err(PupilError::InvalidInput(format!(
                "reference points '{}' and '{}' coincide",
                a, b
            )));
        }

        let scale = Self {
            mm_per_px: size_mm / median,
            reference_px: median,
            reference_std_px: std,
            reference_mm: size_mm,
            n_frames: n,
        };
        tracing::info!(
            "Reference distance {:.3} px (std {:.3}) over {} frames -> {:.5} mm/px",
            median,
            std,
            n,
            scale.mm_per_px
        );
        Ok(scale)
    }

    /// Load a reference tracking CSV and derive the scale.
    pub fn from_reference_csv(path: &Path, a: &str, b: &str, size_mm: f64) -> Result<Self> {
        let table = KeypointTable::from_csv_path(path)?;
        Self::from_reference_table(&table, a, b, size_mm)
    }

    pub fn to_mm(&self, px: f64) -> f64 {
        px * self.mm_per_px
    }
}
