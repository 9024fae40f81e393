//! # binflow
//!
//! A library for running a per-region variant caller over a whole genome as
//! a set of independent bins.
//!
//! Calling variants across a 3 Gbp genome in one process is slow and fragile.
//! `binflow` splits each chromosome into fixed-size bins, writes a Makefile
//! with one rule per bin, and lets `make -j N` run them in parallel. Each bin
//! writes a completion marker only after its outputs are in place, so a failed
//! run resumes where it stopped. When every bin is done the partial results
//! are merged, in chromosome order, into one indexed VCF.
//!
//! ## Features
//!
//! - **Input cross-validation**: Every alignment chromosome must match the reference by name and length
//! - **Depth estimation**: Per-chromosome depth from a seeded record subsample, for depth filtering
//! - **Resumable execution**: Completion markers older than the configuration are re-run
//! - **Ordered consolidation**: BGZF block concatenation without recompression, then tabix indexing
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use binflow::core::config::UserConfig;
//! use binflow::graph::{generator, makefile};
//! use binflow::planning::planner::{plan, PlanRequest};
//!
//! let run_plan = plan(&PlanRequest {
//!     alignment: Path::new("sample.bam"),
//!     reference: Path::new("genome.fa"),
//!     reference_counts: None,
//!     run_dir: Path::new("/scratch/run1"),
//! })
//! .unwrap();
//!
//! let config = run_plan.into_config(UserConfig::default(), None).unwrap();
//! let graph = generator::generate(&config);
//! println!("{} bins", graph.bins.len());
//!
//! let text = makefile::render(&graph, Path::new("/usr/local/bin/binflow"));
//! assert!(text.contains("workflow.complete"));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Chromosomes, bins, run configuration and run directory layout
//! - [`parsing`]: Alignment headers, FASTA base counting and count tables
//! - [`planning`]: Input cross-validation and depth estimation
//! - [`graph`]: Build graph generation and Makefile rendering
//! - [`tasks`]: The per-bin task and the variant caller interface
//! - [`consolidate`]: Merging and indexing per-bin outputs
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod consolidate;
pub mod core;
pub mod graph;
pub mod parsing;
pub mod planning;
pub mod tasks;
pub mod utils;

// Re-export commonly used types for convenience
pub use consolidate::indexer::{Indexer, NoodlesIndexer};
pub use core::bins::{BinId, BinRegion};
pub use core::chromosome::ChromosomeInfo;
pub use core::config::{DerivedConfig, UserConfig, WorkflowConfig};
pub use core::layout::RunLayout;
pub use graph::generator::{generate, BuildGraph};
pub use tasks::caller::{CallRequest, VariantCaller};
