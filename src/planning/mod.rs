//! Planning a run: chromosome/bin partitioning and depth estimation.
//!
//! - [`planner`]: read the alignment header and reference, cross-validate them
//! - [`depth`]: two-pass per-chromosome depth estimation
//! - [`alignment`]: the mapped-record source the depth estimator reads from

pub mod alignment;
pub mod depth;
pub mod planner;
