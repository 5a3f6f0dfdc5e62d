//! High-level estimation API.
//!
//! [`PupilEstimator`] wraps a [`PipelineConfig`] and runs the full pipeline
//! on tracking tables or files. Create once, run on many files.
//!
//! # Examples
//!
//! ```no_run
//! use pupiltrace::PupilEstimator;
//! use std::path::Path;
//!
//! let estimator = PupilEstimator::new();
//! let out = estimator
//!     .estimate_file(Path::new("session/dlc/1/Video0DLC.csv"))
//!     .unwrap();
//! println!("{} blinks", out.estimate.intervals.len());
//! ```

use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::keypoints::KeypointTable;
use crate::output::{write_outputs, OutputLayout, WriteOptions};
use crate::pipeline::{run_pipeline, PipelineOutput};

/// Primary estimation interface.
#[derive(Debug, Clone, Default)]
pub struct PupilEstimator {
    config: PipelineConfig,
}

impl PupilEstimator {
    /// Estimator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control.
    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Load a JSON config file and create an estimator in one step.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(Self::with_config(PipelineConfig::from_json_file(path)?))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    /// Run the pipeline on an in-memory table.
    pub fn estimate_table(&self, table: &KeypointTable) -> Result<PipelineOutput> {
        run_pipeline(table, &self.config)
    }

    /// Load a tracker CSV and run the pipeline. The report records the source path.
    pub fn estimate_file(&self, path: &Path) -> Result<PipelineOutput> {
        let table = KeypointTable::from_csv_path(path)?;
        let mut out = self.estimate_table(&table)?;
        out.report.source = Some(path.to_path_buf());
        Ok(out)
    }

    /// Estimate one file and write its outputs.
    ///
    /// Nothing is written when any stage fails. Returns the output directory.
    pub fn process_file(
        &self,
        path: &Path,
        layout: &OutputLayout,
        opts: &WriteOptions,
    ) -> Result<PathBuf> {
        let dir = layout.resolve(path)?;
        let out = self.estimate_file(path)?;
        write_outputs(&out, &dir, opts)?;
        Ok(dir)
    }
}
