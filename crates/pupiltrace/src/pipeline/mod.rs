//! Stage glue: validate -> fit -> adjust -> blinks -> smooth -> interpolate.
//!
//! Algorithmic pieces live in `crate::stages`; this module only fixes the
//! call order and assembles the per-file report.

mod result;
mod run;

pub use result::{PipelineOutput, PipelineReport, PupilEstimate};
pub use run::run_pipeline;
