//! Merge per-bin partial outputs into the final results.
//!
//! Runs once, after every bin task has completed:
//!
//! - [`variants`]: bin variant partials → `results/variants.vcf.gz` + `.tbi`
//! - [`alignments`]: optional realigned partials → `results/realigned.bam` + `.bai`
//! - [`bgzf`]: block-level BGZF concatenation
//! - [`indexer`]: the [`Indexer`](indexer::Indexer) seam and its noodles implementation
//!
//! Every stage writes to a temporary file inside `results/`, indexes the
//! temporary file, and only then renames both into place. Partials
//! are deleted last. A failed stage leaves the partials untouched and no final
//! file behind, so it can simply be run again.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::consolidate::indexer::Indexer;
use crate::core::config::WorkflowConfig;

pub mod alignments;
pub mod bgzf;
pub mod indexer;
pub mod variants;

#[derive(Error, Debug)]
pub enum ConsolidateError {
    #[error(
        "consistency error: {missing} of {expected} {stage} partials are missing (first: '{first}')"
    )]
    MissingPartials {
        stage: &'static str,
        missing: usize,
        expected: usize,
        first: PathBuf,
    },

    #[error("consistency error: '{0}' is not BGZF compressed")]
    NotBgzf(PathBuf),

    #[error("consistency error: cannot merge alignments from '{path}': {source}")]
    Alignments {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resource error: failed to index '{path}': {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resource error: '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a consolidation stage did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Partials were merged into `output`
    Merged { partials: usize, output: PathBuf },
    /// No partials remain and the final output is already in place
    AlreadyConsolidated { output: PathBuf },
    /// The stage had nothing to do
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consolidation {
    pub variants: StageOutcome,
    pub alignments: StageOutcome,
}

/// Consolidate variant partials, then realigned alignment partials.
///
/// # Errors
///
/// Returns `ConsolidateError` on the first failing stage.
pub fn consolidate(
    config: &WorkflowConfig,
    indexer: &dyn Indexer,
) -> Result<Consolidation, ConsolidateError> {
    let variants = variants::consolidate_variants(config, indexer)?;
    info!(outcome = ?variants, "Variant consolidation finished");

    let alignments = alignments::consolidate_alignments(config, indexer)?;
    info!(outcome = ?alignments, "Alignment consolidation finished");

    Ok(Consolidation {
        variants,
        alignments,
    })
}

fn io_error(path: &Path) -> impl Fn(io::Error) -> ConsolidateError + '_ {
    move |source| ConsolidateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn create_results_dir(dir: &Path) -> Result<(), ConsolidateError> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))
}

/// A temporary file in `dir` whose name ends in `suffix`
fn temp_in(dir: &Path, suffix: &str) -> Result<NamedTempFile, ConsolidateError> {
    tempfile::Builder::new()
        .prefix(".binflow-")
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(io_error(dir))
}

/// Build the index of `data` into a temporary file next to `index_dest`
fn build_index(
    data: &Path,
    index_dest: &Path,
    index: impl FnOnce(&Path, &Path) -> io::Result<()>,
) -> Result<NamedTempFile, ConsolidateError> {
    let dir = index_dest.parent().unwrap_or_else(|| Path::new("."));
    let suffix = index_dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let temp = temp_in(dir, &suffix)?;

    debug!(data = %data.display(), "Building index");
    index(data, temp.path()).map_err(|source| ConsolidateError::Index {
        path: data.to_path_buf(),
        source,
    })?;
    Ok(temp)
}

fn persist(temp: NamedTempFile, dest: &Path) -> Result<(), ConsolidateError> {
    temp.persist(dest)
        .map_err(|e| io_error(dest)(e.error))?;
    Ok(())
}

fn remove_partials(partials: &[PathBuf]) -> Result<(), ConsolidateError> {
    for path in partials {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ConsolidateError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
    Ok(())
}
