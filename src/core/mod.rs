//! Core data types shared by planning, graph generation and consolidation.
//!
//! - [`chromosome`]: chromosomes declared by the alignment header and checked against the reference
//! - [`bins`]: fixed-size bin partitioning of a chromosome
//! - [`config`]: the persisted two-namespace workflow configuration
//! - [`layout`]: where every file of a run lives

pub mod bins;
pub mod chromosome;
pub mod config;
pub mod layout;
