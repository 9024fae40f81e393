//! The action run by each per-bin node of the build graph.
//!
//! - [`bin_task`]: resolve the bin, call variants, verify outputs, write the completion marker
//! - [`caller`]: the external variant caller interface and its command-line implementation

pub mod bin_task;
pub mod caller;
