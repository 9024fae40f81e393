//! Command-line interface for binflow.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **configure**: Validate inputs, plan bins, estimate depth, write the run directory
//! - **call-bin**: Run the variant caller for one bin (invoked by the generated Makefile)
//! - **consolidate**: Merge per-bin outputs into the final results (invoked by the Makefile)
//! - **count-bases**: Count known and total bases per contig of a FASTA file
//! - **show-plan**: Print the chromosomes and bins of a configured run
//!
//! ## Usage
//!
//! ```text
//! # Set up a run
//! binflow configure --alignment sample.bam --reference genome.fa --run-dir run1
//!
//! # Execute it with any parallelism
//! make -C run1 -j 16
//!
//! # Precompute reference counts once and reuse them
//! binflow count-bases genome.fa > genome.counts.tsv
//! binflow configure --alignment sample.bam --reference genome.fa \
//!     --reference-counts genome.counts.tsv --run-dir run2
//! ```

use clap::{Parser, Subcommand};

pub mod call_bin;
pub mod configure;
pub mod consolidate;
pub mod count_bases;
pub mod show_plan;

#[derive(Parser)]
#[command(name = "binflow")]
#[command(version)]
#[command(about = "Partition a genome into bins and drive per-bin variant calling with make")]
#[command(
    long_about = "binflow splits a genome into fixed-size bins, checks the alignment header against the reference, estimates per-chromosome depth, and writes a Makefile that runs the variant caller on every bin.\n\nRun the generated Makefile with `make -j N`. Re-running it after a failure only repeats the bins that did not finish, then merges the per-bin results into one indexed output."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan a run and write its configuration and Makefile
    Configure(configure::ConfigureArgs),

    /// Run variant calling for a single bin
    CallBin(call_bin::CallBinArgs),

    /// Merge per-bin outputs into final results
    Consolidate(consolidate::ConsolidateArgs),

    /// Count known and total bases per FASTA contig
    CountBases(count_bases::CountBasesArgs),

    /// Show the chromosomes and bins of a configured run
    ShowPlan(show_plan::ShowPlanArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
