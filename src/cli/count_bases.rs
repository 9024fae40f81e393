use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::cli::OutputFormat;
use crate::parsing::base_counts::format_counts;
use crate::parsing::fasta::count_bases;

#[derive(Args)]
pub struct CountBasesArgs {
    /// FASTA files to scan (optionally gzip compressed)
    #[arg(required = true)]
    pub fasta: Vec<PathBuf>,

    /// Write the counts here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute count-bases subcommand
///
/// Text and TSV output are the same tab-delimited table
/// (`file`, `contig`, `known`, `total`) that `configure --reference-counts`
/// reads back.
///
/// # Errors
///
/// Returns an error if a FASTA file cannot be read or the output cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: CountBasesArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut counts = Vec::new();
    for path in &args.fasta {
        let file_counts = count_bases(path)?;
        if verbose {
            eprintln!("Counted {} contigs in {}", file_counts.len(), path.display());
        }
        counts.extend(file_counts);
    }

    let text = match format {
        OutputFormat::Text | OutputFormat::Tsv => format_counts(&counts),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&counts)?;
            json.push('\n');
            json
        }
    };

    match &args.output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => std::io::stdout().lock().write_all(text.as_bytes())?,
    }

    Ok(())
}
