use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::consolidate::indexer::Indexer;
use crate::consolidate::{
    bgzf, build_index, create_results_dir, io_error, persist, remove_partials, temp_in,
    ConsolidateError, StageOutcome,
};
use crate::core::config::WorkflowConfig;
use crate::core::layout::RunLayout;

/// Expected variant partials, in chromosome then bin order
#[must_use]
pub fn variant_partials(config: &WorkflowConfig) -> Vec<PathBuf> {
    let layout = RunLayout::new(&config.derived.run_dir);
    config
        .all_bins()
        .map(|(chrom, region)| layout.bin(&chrom.label, region.bin).variants())
        .collect()
}

/// Merge every bin's variant partial into `results/variants.vcf.gz` and index it.
///
/// Every bin must have a partial. The first bin's partial carries the VCF
/// header and the rest do not, so concatenating them in bin order yields a
/// single sorted VCF. If no partial remains and the final file exists, a
/// previous run already finished and nothing is done beyond rebuilding a
/// missing index.
///
/// # Errors
///
/// Returns `ConsolidateError::MissingPartials` if some but not all partials
/// exist, or if none exist and there is no final output, and other variants
/// for failures while merging, indexing or promoting.
pub fn consolidate_variants(
    config: &WorkflowConfig,
    indexer: &dyn Indexer,
) -> Result<StageOutcome, ConsolidateError> {
    let layout = RunLayout::new(&config.derived.run_dir);
    let output = layout.final_variants();
    let index_dest = layout.final_variants_index();

    let expected = variant_partials(config);
    let expected_count = expected.len();
    let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) =
        expected.into_iter().partition(|p| p.is_file());

    if present.is_empty() && output.is_file() {
        if !index_dest.is_file() {
            warn!(output = %output.display(), "Consolidated variants have no index, rebuilding it");
            let index = build_index(&output, &index_dest, |src, dst| {
                indexer.index_variants(src, dst)
            })?;
            persist(index, &index_dest)?;
        }
        info!(output = %output.display(), "Variants already consolidated");
        return Ok(StageOutcome::AlreadyConsolidated { output });
    }
    if let Some(first) = missing.first() {
        return Err(ConsolidateError::MissingPartials {
            stage: "variant",
            missing: missing.len(),
            expected: expected_count,
            first: first.clone(),
        });
    }

    create_results_dir(&layout.results_dir())?;

    if let [single] = present.as_slice() {
        info!(partial = %single.display(), "Promoting single variant partial");
        let index = build_index(single, &index_dest, |src, dst| {
            indexer.index_variants(src, dst)
        })?;
        // Index first: once the partial is renamed it cannot be indexed again from a rerun
        persist(index, &index_dest)?;
        std::fs::rename(single, &output).map_err(io_error(&output))?;
    } else {
        info!(partials = present.len(), "Concatenating variant partials");
        let mut temp = temp_in(&layout.results_dir(), ".vcf.gz")?;
        {
            let mut out = BufWriter::new(temp.as_file_mut());
            bgzf::concat(&present, &mut out)?;
            out.flush().map_err(io_error(&output))?;
        }
        temp.as_file().sync_all().map_err(io_error(&output))?;

        let index = build_index(temp.path(), &index_dest, |src, dst| {
            indexer.index_variants(src, dst)
        })?;
        persist(temp, &output)?;
        persist(index, &index_dest)?;
        remove_partials(&present)?;
    }

    info!(output = %output.display(), "Variants consolidated");
    Ok(StageOutcome::Merged {
        partials: present.len(),
        output,
    })
}
