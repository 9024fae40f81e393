use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::core::bins::BinId;
use crate::core::config::WorkflowConfig;
use crate::tasks::bin_task::is_complete;

#[derive(Args)]
pub struct ShowPlanArgs {
    /// Run configuration written by `binflow configure`
    #[arg(long)]
    pub config: PathBuf,

    /// List every bin instead of one line per chromosome
    #[arg(long)]
    pub bins: bool,
}

#[derive(Debug, Serialize)]
struct ChromosomeRow<'a> {
    name: &'a str,
    label: &'a str,
    length: u64,
    known_bases: u64,
    bins: u64,
    complete: u64,
}

#[derive(Debug, Serialize)]
struct BinRow<'a> {
    chromosome: &'a str,
    bin: BinId,
    begin: u64,
    end: u64,
    complete: bool,
}

/// Execute show-plan subcommand
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ShowPlanArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let config = WorkflowConfig::load(&args.config)?;

    if args.bins {
        print_bins(&bin_rows(&config), format)
    } else {
        print_chromosomes(&config, &chromosome_rows(&config), format)
    }
}

fn bin_rows(config: &WorkflowConfig) -> Vec<BinRow<'_>> {
    config
        .all_bins()
        .map(|(chrom, region)| BinRow {
            chromosome: &chrom.name,
            bin: region.bin,
            begin: region.begin,
            end: region.clipped_end(chrom.length),
            complete: is_complete(config, &chrom.label, region.bin),
        })
        .collect()
}

fn chromosome_rows(config: &WorkflowConfig) -> Vec<ChromosomeRow<'_>> {
    config
        .derived
        .chromosomes
        .iter()
        .map(|chrom| {
            let mut bins = 0;
            let mut complete = 0;
            for region in config.bins(chrom) {
                bins += 1;
                if is_complete(config, &chrom.label, region.bin) {
                    complete += 1;
                }
            }
            ChromosomeRow {
                name: &chrom.name,
                label: &chrom.label,
                length: chrom.length,
                known_bases: chrom.known_bases,
                bins,
                complete,
            }
        })
        .collect()
}

fn print_chromosomes(
    config: &WorkflowConfig,
    rows: &[ChromosomeRow<'_>],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            let total: u64 = rows.iter().map(|r| r.bins).sum();
            let complete: u64 = rows.iter().map(|r| r.complete).sum();
            println!(
                "{} chromosomes, {} bins of {} bp ({} complete)\n",
                rows.len(),
                total,
                config.user.bin_size,
                complete
            );
            println!(
                "{:<25} {:>15} {:>15} {:>8} {:>9}",
                "Chromosome", "Length", "Known", "Bins", "Complete"
            );
            println!("{}", "-".repeat(76));
            for row in rows {
                println!(
                    "{:<25} {:>15} {:>15} {:>8} {:>9}",
                    row.name, row.length, row.known_bases, row.bins, row.complete
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Tsv => {
            println!("name\tlabel\tlength\tknown_bases\tbins\tcomplete");
            for row in rows {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    row.name, row.label, row.length, row.known_bases, row.bins, row.complete
                );
            }
        }
    }
    Ok(())
}

fn print_bins(rows: &[BinRow<'_>], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for row in rows {
                println!(
                    "{}:{}-{}\tbin {}\t{}",
                    row.chromosome,
                    row.begin,
                    row.end,
                    row.bin,
                    if row.complete { "complete" } else { "pending" }
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Tsv => {
            println!("chromosome\tbin\tbegin\tend\tcomplete");
            for row in rows {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    row.chromosome, row.bin, row.begin, row.end, row.complete
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::tests::sample_config;
    use std::path::Path;

    #[test]
    fn test_bin_rows_json_uses_padded_bin_ids() {
        let config = sample_config(Path::new("/runs/a"), &[("chr1", 2_500)], 1_000);
        let rows = bin_rows(&config);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].end, 2_500);

        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[2]["bin"], "0002");
        assert_eq!(json[2]["complete"], false);
    }
}
