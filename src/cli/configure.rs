use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::core::config::{UserConfig, WorkflowConfig};
use crate::core::layout::RunLayout;
use crate::graph::{generator, makefile};
use crate::parsing::sam::AlignmentFormat;
use crate::planning::alignment::NoodlesAlignmentSource;
use crate::planning::depth::DepthEstimator;
use crate::planning::planner::{self, PlanRequest, RunPlan};

#[derive(Args)]
pub struct ConfigureArgs {
    /// Aligned reads (SAM, BAM or CRAM); only the header is needed for CRAM
    #[arg(short, long)]
    pub alignment: PathBuf,

    /// Reference FASTA the reads were aligned to (optionally gzip compressed)
    #[arg(short, long)]
    pub reference: PathBuf,

    /// Output of `binflow count-bases` for the reference, used instead of scanning it
    #[arg(long)]
    pub reference_counts: Option<PathBuf>,

    /// Run directory to create
    #[arg(short = 'o', long)]
    pub run_dir: PathBuf,

    /// TOML file with a [user] table overriding the default settings
    #[arg(long)]
    pub user_config: Option<PathBuf>,

    /// Bin size in bases (overrides the user config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub bin_size: Option<u64>,

    /// Variant caller executable (overrides the user config)
    #[arg(long)]
    pub caller: Option<String>,

    /// Skip chromosome depth estimation
    #[arg(long)]
    pub no_depth_estimate: bool,

    /// Ask the caller for realigned reads and merge them into results/realigned.bam
    #[arg(long)]
    pub write_realigned: bool,

    /// Replace the configuration of an existing run directory
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct ConfigureSummary {
    run_dir: PathBuf,
    chromosomes: usize,
    bins: u64,
    bin_size: u64,
    genome_size: u64,
    total_genome_size: u64,
    chrom_depth_file: Option<PathBuf>,
    makefile: PathBuf,
}

/// Execute configure subcommand
///
/// # Errors
///
/// Returns an error if the inputs are inconsistent, depth estimation fails,
/// or the run directory cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ConfigureArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let layout = RunLayout::new(&args.run_dir);
    if layout.config().exists() && !args.force {
        bail!(
            "configuration error: '{}' already exists (use --force to replace it)",
            layout.config().display()
        );
    }

    let user = user_settings(&args)?;

    std::fs::create_dir_all(&args.run_dir)
        .with_context(|| format!("Failed to create run directory '{}'", args.run_dir.display()))?;
    // The Makefile runs from inside the run directory, so store absolute paths
    let run_dir = absolute(&args.run_dir)?;
    let alignment = absolute(&args.alignment)?;
    let reference = absolute(&args.reference)?;
    let layout = RunLayout::new(&run_dir);

    let plan = planner::plan(&PlanRequest {
        alignment: &alignment,
        reference: &reference,
        reference_counts: args.reference_counts.as_deref(),
        run_dir: &run_dir,
    })?;

    let chrom_depth_file = if user.estimate_depth {
        estimate_depth(&plan, &layout)?
    } else {
        info!("Chromosome depth estimation disabled");
        None
    };

    let config = plan.into_config(user, chrom_depth_file)?;
    config.save(&layout.config())?;

    let graph = generator::generate(&config);
    let runner = std::env::current_exe().context("Failed to locate the binflow executable")?;
    makefile::write(&graph, &runner, &layout.makefile())?;

    info!(
        run_dir = %run_dir.display(),
        bins = graph.bins.len(),
        "Run configured"
    );

    print_summary(&summary(&config, &layout), format)
}

fn user_settings(args: &ConfigureArgs) -> anyhow::Result<UserConfig> {
    let mut user = match &args.user_config {
        Some(path) => UserConfig::load(path)?,
        None => UserConfig::default(),
    };
    if let Some(bin_size) = args.bin_size {
        user.bin_size = bin_size;
    }
    if let Some(caller) = &args.caller {
        user.caller.clone_from(caller);
    }
    if args.no_depth_estimate {
        user.estimate_depth = false;
    }
    if args.write_realigned {
        user.write_realigned_alignments = true;
    }
    Ok(user)
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(path)
        .with_context(|| format!("resource error: cannot resolve '{}'", path.display()))
}

fn estimate_depth(plan: &RunPlan, layout: &RunLayout) -> anyhow::Result<Option<PathBuf>> {
    if AlignmentFormat::from_path(&plan.alignment_path)? == AlignmentFormat::Cram {
        warn!("Depth estimation is not available for CRAM input, continuing without a depth table");
        return Ok(None);
    }

    let mut source = NoodlesAlignmentSource::new(&plan.alignment_path)?;
    let Some(estimate) = DepthEstimator::default().estimate(&mut source, &plan.chromosomes)? else {
        return Ok(None);
    };

    let path = layout.depth_file();
    estimate.write_table(&path)?;
    Ok(Some(path))
}

fn summary(config: &WorkflowConfig, layout: &RunLayout) -> ConfigureSummary {
    ConfigureSummary {
        run_dir: config.derived.run_dir.clone(),
        chromosomes: config.derived.chromosomes.len(),
        bins: config.all_bins().count() as u64,
        bin_size: config.user.bin_size,
        genome_size: config.derived.genome_size,
        total_genome_size: config.derived.total_genome_size,
        chrom_depth_file: config.derived.chrom_depth_file.clone(),
        makefile: layout.makefile(),
    }
}

fn print_summary(summary: &ConfigureSummary, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Run directory:  {}", summary.run_dir.display());
            println!("Chromosomes:    {}", summary.chromosomes);
            println!("Bins:           {} ({} bp each)", summary.bins, summary.bin_size);
            println!(
                "Genome size:    {} known of {} total bases",
                summary.genome_size, summary.total_genome_size
            );
            match &summary.chrom_depth_file {
                Some(path) => println!("Depth table:    {}", path.display()),
                None => println!("Depth table:    (none)"),
            }
            println!("\nRun with: make -C {} -j <jobs>", summary.run_dir.display());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Tsv => {
            println!(
                "run_dir\tchromosomes\tbins\tbin_size\tgenome_size\ttotal_genome_size\tchrom_depth_file"
            );
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                summary.run_dir.display(),
                summary.chromosomes,
                summary.bins,
                summary.bin_size,
                summary.genome_size,
                summary.total_genome_size,
                summary
                    .chrom_depth_file
                    .as_ref()
                    .map_or_else(String::new, |p| p.display().to_string())
            );
        }
    }
    Ok(())
}
