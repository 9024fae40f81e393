use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::consolidate::indexer::NoodlesIndexer;
use crate::consolidate::{self, StageOutcome};
use crate::core::config::WorkflowConfig;

#[derive(Args)]
pub struct ConsolidateArgs {
    /// Run configuration written by `binflow configure`
    #[arg(long)]
    pub config: PathBuf,
}

/// Execute consolidate subcommand
///
/// # Errors
///
/// Returns an error if the configuration is invalid, partial outputs are
/// missing, or merging and indexing fail.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ConsolidateArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let config = WorkflowConfig::load(&args.config)?;
    let result = consolidate::consolidate(&config, &NoodlesIndexer)?;

    match format {
        OutputFormat::Text => {
            println!("Variants:   {}", describe(&result.variants));
            println!("Alignments: {}", describe(&result.alignments));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Tsv => {
            println!("stage\tstatus\tpartials\toutput");
            let stages = [("variants", &result.variants), ("alignments", &result.alignments)];
            for (stage, outcome) in stages {
                let (status, partials, output) = match outcome {
                    StageOutcome::Merged { partials, output } => {
                        ("merged", partials.to_string(), output.display().to_string())
                    }
                    StageOutcome::AlreadyConsolidated { output } => {
                        ("already_consolidated", String::new(), output.display().to_string())
                    }
                    StageOutcome::Skipped => ("skipped", String::new(), String::new()),
                };
                println!("{stage}\t{status}\t{partials}\t{output}");
            }
        }
    }

    Ok(())
}

fn describe(outcome: &StageOutcome) -> String {
    match outcome {
        StageOutcome::Merged { partials, output } => {
            format!("merged {partials} partial(s) into {}", output.display())
        }
        StageOutcome::AlreadyConsolidated { output } => {
            format!("already consolidated in {}", output.display())
        }
        StageOutcome::Skipped => "nothing to merge".to_string(),
    }
}
