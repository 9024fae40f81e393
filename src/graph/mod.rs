//! Build graph generation.
//!
//! - [`generator`]: the in-memory task graph (bin tasks plus one finish task)
//! - [`makefile`]: rendering the graph as rules for GNU make

pub mod generator;
pub mod makefile;
