use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::cli::OutputFormat;
use crate::core::bins::BinId;
use crate::core::config::WorkflowConfig;
use crate::tasks::bin_task::run_bin;
use crate::tasks::caller::CommandCaller;

#[derive(Args)]
pub struct CallBinArgs {
    /// Run configuration written by `binflow configure`
    #[arg(long)]
    pub config: PathBuf,

    /// Chromosome label, as used in the run directory
    #[arg(long)]
    pub chrom: String,

    /// Bin id within the chromosome (e.g. 0003)
    #[arg(long)]
    pub bin: BinId,

    /// Do not write a VCF header (every bin but the first)
    #[arg(long)]
    pub skip_header: bool,
}

/// Execute call-bin subcommand
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the bin does not exist,
/// or the variant caller fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: CallBinArgs, _format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let config = WorkflowConfig::load(&args.config)?;
    let caller = CommandCaller::new(config.user.caller.clone());

    run_bin(&config, &args.chrom, args.bin, args.skip_header, &caller)
        .with_context(|| format!("Bin {}/{} failed", args.chrom, args.bin))?;

    Ok(())
}
