//! The external variant caller, invoked once per bin.
//!
//! [`VariantCaller`] is the seam; [`CommandCaller`] runs the configured
//! executable and tests provide their own implementations.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::bins::BinRegion;
use crate::core::chromosome::ChromosomeInfo;
use crate::core::config::WorkflowConfig;
use crate::core::layout::BinPaths;
use crate::tasks::bin_task::TaskError;

/// Everything the caller needs to process one bin
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub chromosome: String,
    /// 1-based inclusive start
    pub begin: u64,
    /// 1-based inclusive end, not clipped to the chromosome length
    pub end: u64,
    pub alignment_path: PathBuf,
    pub reference_path: PathBuf,
    pub variants_out: PathBuf,
    pub realigned_out: Option<PathBuf>,
    pub log_path: PathBuf,
    pub depth_filter_multiple: f64,
    pub min_qscore: u32,
    pub max_indel_repeat: u32,
    pub min_mapping_quality: u8,
    pub min_tier2_mapping_quality: u8,
    pub max_input_depth: Option<u32>,
    pub chrom_depth_file: Option<PathBuf>,
    pub skip_header: bool,
}

impl CallRequest {
    #[must_use]
    pub fn new(
        config: &WorkflowConfig,
        chrom: &ChromosomeInfo,
        region: BinRegion,
        paths: &BinPaths,
        skip_header: bool,
    ) -> Self {
        let user = &config.user;
        Self {
            chromosome: chrom.name.clone(),
            begin: region.begin,
            end: region.end,
            alignment_path: config.derived.alignment_path.clone(),
            reference_path: config.derived.reference_path.clone(),
            variants_out: paths.variants(),
            realigned_out: user.write_realigned_alignments.then(|| paths.realigned()),
            log_path: paths.caller_log(),
            depth_filter_multiple: user.depth_filter_multiple,
            min_qscore: user.min_qscore,
            max_indel_repeat: user.max_indel_repeat,
            min_mapping_quality: user.min_mapping_quality,
            min_tier2_mapping_quality: user.min_tier2_mapping_quality,
            max_input_depth: user.max_input_depth,
            chrom_depth_file: config.derived.chrom_depth_file.clone(),
            skip_header,
        }
    }

    /// Command-line arguments for the caller executable
    #[must_use]
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |flag: &str, value: OsString| {
            args.push(flag.into());
            args.push(value);
        };

        push("--ref", self.reference_path.clone().into());
        push("--bam", self.alignment_path.clone().into());
        push("--chrom", self.chromosome.clone().into());
        push("--begin", self.begin.to_string().into());
        push("--end", self.end.to_string().into());
        push("--vcf-out", self.variants_out.clone().into());
        push("--depth-filter-multiple", self.depth_filter_multiple.to_string().into());
        push("--min-qscore", self.min_qscore.to_string().into());
        push("--max-indel-repeat", self.max_indel_repeat.to_string().into());
        push("--min-mapq", self.min_mapping_quality.to_string().into());
        push("--min-tier2-mapq", self.min_tier2_mapping_quality.to_string().into());
        if let Some(depth) = self.max_input_depth {
            push("--max-input-depth", depth.to_string().into());
        }
        if let Some(path) = &self.chrom_depth_file {
            push("--chrom-depth-file", path.clone().into());
        }
        if let Some(path) = &self.realigned_out {
            push("--realigned-bam-out", path.clone().into());
        }
        if self.skip_header {
            args.push("--skip-vcf-header".into());
        }

        args
    }
}

/// Runs variant calling for one bin
pub trait VariantCaller {
    /// Produce the bin's outputs at the paths named in `request`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError` if the caller cannot be started or fails.
    fn call(&self, request: &CallRequest) -> Result<(), TaskError>;
}

/// Runs the caller as a child process, with stderr captured in the bin log
#[derive(Debug, Clone)]
pub struct CommandCaller {
    program: String,
}

impl CommandCaller {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl VariantCaller for CommandCaller {
    fn call(&self, request: &CallRequest) -> Result<(), TaskError> {
        let log = File::create(&request.log_path).map_err(|source| TaskError::Io {
            path: request.log_path.clone(),
            source,
        })?;

        let args = request.to_args();
        debug!(program = %self.program, ?args, "Running variant caller");

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log)
            .status()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    TaskError::MissingTool {
                        program: self.program.clone(),
                    }
                } else {
                    TaskError::Spawn {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;

        if !status.success() {
            return Err(TaskError::CallerFailed {
                program: self.program.clone(),
                status: status.to_string(),
                log: request.log_path.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bins::BinId;
    use crate::core::config::tests::sample_config;
    use crate::core::layout::RunLayout;
    use std::path::Path;

    fn request(write_realigned: bool, skip_header: bool) -> CallRequest {
        let mut config = sample_config(Path::new("/runs/a"), &[("chr1", 2_500_000)], 1_000_000);
        config.user.write_realigned_alignments = write_realigned;
        config.user.max_input_depth = Some(300);
        let chrom = config.derived.chromosomes[0].clone();
        let region = config.bin_region(&chrom, BinId(2)).unwrap();
        let paths = RunLayout::new("/runs/a").bin(&chrom.label, BinId(2));
        CallRequest::new(&config, &chrom, region, &paths, skip_header)
    }

    fn args_text(request: &CallRequest) -> Vec<String> {
        request
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_request_region_is_unclipped() {
        let request = request(false, false);
        assert_eq!(request.begin, 2_000_001);
        assert_eq!(request.end, 3_000_000);
        assert_eq!(
            request.variants_out,
            PathBuf::from("/runs/a/chromosomes/chr1/bins/0002/variants.vcf.gz")
        );
        assert!(request.realigned_out.is_none());
    }

    #[test]
    fn test_args() {
        let args = args_text(&request(true, true));
        let joined = args.join(" ");
        assert!(joined.contains("--chrom chr1 --begin 2000001 --end 3000000"));
        assert!(joined.contains("--max-input-depth 300"));
        assert!(
            joined.contains("--realigned-bam-out /runs/a/chromosomes/chr1/bins/0002/realigned.bam")
        );
        assert_eq!(args.last().unwrap(), "--skip-vcf-header");
        assert!(!joined.contains("--chrom-depth-file"));
    }

    #[test]
    fn test_header_writer_args() {
        let args = args_text(&request(false, false));
        assert!(!args.contains(&"--skip-vcf-header".to_string()));
        assert!(!args.contains(&"--realigned-bam-out".to_string()));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request(false, false);
        request.log_path = dir.path().join("caller.log");

        let caller = CommandCaller::new("binflow-test-no-such-caller");
        assert!(matches!(
            caller.call(&request),
            Err(TaskError::MissingTool { program }) if program == "binflow-test-no-such-caller"
        ));
    }
}
