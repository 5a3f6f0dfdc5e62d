//! Per-stage signal processing. Each stage takes the previous stage's output
//! by reference and returns a new value.
//!
//! The `pipeline` module owns the call order.

pub mod adjust;
pub mod blink;
pub mod height_model;
pub mod interpolate;
pub mod smooth;
pub mod validate;
