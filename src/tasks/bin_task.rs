use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::core::bins::BinId;
use crate::core::config::{ConfigError, WorkflowConfig};
use crate::core::layout::{BinPaths, RunLayout};
use crate::tasks::caller::{CallRequest, VariantCaller};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("configuration error: no chromosome with label '{0}' in this run")]
    UnknownChromosome(String),

    #[error("configuration error: bin {bin} is out of range for chromosome '{chromosome}' ({bins} bins)")]
    BinOutOfRange {
        chromosome: String,
        bin: BinId,
        bins: u64,
    },

    #[error("resource error: variant caller '{program}' not found")]
    MissingTool { program: String },

    #[error("resource error: failed to start variant caller '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("task error: variant caller '{program}' failed ({status}), see '{log}'")]
    CallerFailed {
        program: String,
        status: String,
        log: PathBuf,
    },

    #[error("consistency error: bin task finished without writing '{0}'")]
    MissingOutput(PathBuf),

    #[error("resource error: '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Files a completed bin task left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinOutcome {
    pub variants: PathBuf,
    pub realigned: Option<PathBuf>,
    pub marker: PathBuf,
}

/// Run one bin: call variants, check the outputs, then mark the bin complete.
///
/// Any marker and partial outputs left by an earlier attempt are removed
/// first, so the marker only ever exists alongside outputs from the same
/// successful attempt.
///
/// # Errors
///
/// Returns `TaskError` if the bin does not exist in `config`, the caller
/// fails, or the caller reports success without writing its variant output.
pub fn run_bin(
    config: &WorkflowConfig,
    label: &str,
    bin: BinId,
    skip_header: bool,
    caller: &dyn VariantCaller,
) -> Result<BinOutcome, TaskError> {
    let chrom = config
        .chromosome_by_label(label)
        .ok_or_else(|| TaskError::UnknownChromosome(label.to_string()))?;
    let region = config
        .bin_region(chrom, bin)
        .ok_or_else(|| TaskError::BinOutOfRange {
            chromosome: chrom.name.clone(),
            bin,
            bins: config.bins(chrom).count() as u64,
        })?;

    let paths = RunLayout::new(&config.derived.run_dir).bin(&chrom.label, bin);
    clear_previous_attempt(&paths)?;
    std::fs::create_dir_all(&paths.dir).map_err(|source| TaskError::Io {
        path: paths.dir.clone(),
        source,
    })?;

    info!(
        chromosome = %chrom.name,
        bin = %bin,
        begin = region.begin,
        end = region.end,
        skip_header,
        "Calling variants"
    );
    let request = CallRequest::new(config, chrom, region, &paths, skip_header);
    caller.call(&request)?;

    if !request.variants_out.is_file() {
        return Err(TaskError::MissingOutput(request.variants_out));
    }
    let realigned = request.realigned_out.filter(|p| p.is_file());
    if config.user.write_realigned_alignments && realigned.is_none() {
        warn!(chromosome = %chrom.name, bin = %bin, "No realigned alignments written for bin");
    }

    write_marker(&paths.marker(), &chrom.name, bin)?;
    info!(chromosome = %chrom.name, bin = %bin, "Bin complete");

    Ok(BinOutcome {
        variants: request.variants_out,
        realigned,
        marker: paths.marker(),
    })
}

/// Whether a bin has been marked complete
#[must_use]
pub fn is_complete(config: &WorkflowConfig, label: &str, bin: BinId) -> bool {
    RunLayout::new(&config.derived.run_dir)
        .bin(label, bin)
        .marker()
        .is_file()
}

fn clear_previous_attempt(paths: &BinPaths) -> Result<(), TaskError> {
    for path in [paths.marker(), paths.variants(), paths.realigned()] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(TaskError::Io { path, source }),
        }
    }
    Ok(())
}

fn write_marker(path: &Path, chromosome: &str, bin: BinId) -> Result<(), TaskError> {
    let io_error = |source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    writeln!(temp, "{chromosome}\t{bin}").map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::config::tests::sample_config;
    use std::cell::RefCell;

    /// Writes placeholder outputs, or fails, and records every request
    #[derive(Default)]
    pub(crate) struct FakeCaller {
        pub fail: bool,
        pub write_variants: bool,
        pub requests: RefCell<Vec<CallRequest>>,
    }

    impl FakeCaller {
        pub(crate) fn writing() -> Self {
            Self {
                write_variants: true,
                ..Self::default()
            }
        }
    }

    impl VariantCaller for FakeCaller {
        fn call(&self, request: &CallRequest) -> Result<(), TaskError> {
            self.requests.borrow_mut().push(request.clone());
            if self.fail {
                return Err(TaskError::CallerFailed {
                    program: "fake".to_string(),
                    status: "exit status: 1".to_string(),
                    log: request.log_path.clone(),
                });
            }
            if self.write_variants {
                std::fs::write(&request.variants_out, request.chromosome.as_bytes()).unwrap();
            }
            Ok(())
        }
    }

    #[test]
    fn test_run_bin_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 2_500_000)], 1_000_000);
        let caller = FakeCaller::writing();

        let outcome = run_bin(&config, "chr1", BinId(1), true, &caller).unwrap();
        assert!(outcome.marker.is_file());
        assert!(outcome.variants.is_file());
        assert!(is_complete(&config, "chr1", BinId(1)));
        assert!(!is_complete(&config, "chr1", BinId(0)));

        let requests = caller.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].begin, 1_000_001);
        assert!(requests[0].skip_header);
    }

    #[test]
    fn test_failed_caller_leaves_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 1000)], 100);
        let caller = FakeCaller {
            fail: true,
            ..FakeCaller::default()
        };

        assert!(run_bin(&config, "chr1", BinId(0), false, &caller).is_err());
        assert!(!is_complete(&config, "chr1", BinId(0)));
    }

    #[test]
    fn test_missing_output_is_consistency_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 1000)], 100);
        let caller = FakeCaller::default();

        let err = run_bin(&config, "chr1", BinId(0), false, &caller).unwrap_err();
        assert!(matches!(err, TaskError::MissingOutput(_)));
        assert!(err.to_string().starts_with("consistency error"));
        assert!(!is_complete(&config, "chr1", BinId(0)));
    }

    #[test]
    fn test_rerun_after_failure_clears_stale_marker() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 1000)], 100);

        run_bin(&config, "chr1", BinId(3), false, &FakeCaller::writing()).unwrap();
        assert!(is_complete(&config, "chr1", BinId(3)));

        let failing = FakeCaller {
            fail: true,
            ..FakeCaller::default()
        };
        assert!(run_bin(&config, "chr1", BinId(3), false, &failing).is_err());
        assert!(!is_complete(&config, "chr1", BinId(3)));
        let paths = RunLayout::new(dir.path()).bin("chr1", BinId(3));
        assert!(!paths.variants().exists());
    }

    #[test]
    fn test_unknown_chromosome_and_bin() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 1000)], 100);
        let caller = FakeCaller::writing();

        assert!(matches!(
            run_bin(&config, "chrX", BinId(0), false, &caller),
            Err(TaskError::UnknownChromosome(_))
        ));
        assert!(matches!(
            run_bin(&config, "chr1", BinId(10), false, &caller),
            Err(TaskError::BinOutOfRange { bins: 10, .. })
        ));
        assert!(caller.requests.borrow().is_empty());
    }
}
