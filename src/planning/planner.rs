use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::core::bins::bin_count;
use crate::core::chromosome::{ChromosomeInfo, ContigBaseCounts, DeclaredSequence};
use crate::core::config::{ConfigError, DerivedConfig, UserConfig, WorkflowConfig};
use crate::parsing::sam::ParseError;
use crate::parsing::{base_counts, fasta, sam};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("configuration error: reference contig '{0}' appears more than once")]
    DuplicateContig(String),

    #[error(
        "configuration error: alignment header and reference disagree:\n{}",
        .0.iter().map(|m| format!("  - {m}")).collect::<Vec<_>>().join("\n")
    )]
    ReferenceMismatch(Vec<ReferenceMismatch>),
}

/// One disagreement between the alignment header and the reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceMismatch {
    /// Alignment chromosome has no same-named reference contig
    MissingContig { name: String },
    /// Lengths differ between header and reference
    LengthDiffers {
        name: String,
        declared: u64,
        reference: u64,
    },
    /// Reference contig has no sequence
    EmptyContig { name: String },
}

impl fmt::Display for ReferenceMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingContig { name } => {
                write!(f, "chromosome '{name}' is not present in the reference")
            }
            Self::LengthDiffers {
                name,
                declared,
                reference,
            } => write!(
                f,
                "chromosome '{name}' has length {declared} in the alignment header but {reference} in the reference"
            ),
            Self::EmptyContig { name } => {
                write!(f, "reference contig '{name}' has no sequence")
            }
        }
    }
}

/// Chromosomes and input paths for one run, before user tunables are attached
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_dir: PathBuf,
    pub alignment_path: PathBuf,
    pub reference_path: PathBuf,
    pub chromosomes: Vec<ChromosomeInfo>,
}

impl RunPlan {
    /// Known bases over all planned chromosomes
    #[must_use]
    pub fn genome_size(&self) -> u64 {
        self.chromosomes.iter().map(|c| c.known_bases).sum()
    }

    /// All reference bases over all planned chromosomes
    #[must_use]
    pub fn total_genome_size(&self) -> u64 {
        self.chromosomes.iter().map(|c| c.reference_length).sum()
    }

    /// Total number of bins for a given bin size
    #[must_use]
    pub fn bin_count(&self, bin_size: u64) -> u64 {
        self.chromosomes
            .iter()
            .map(|c| bin_count(c.length, bin_size))
            .sum()
    }

    /// Attach user tunables and the optional depth table to make the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the combination is invalid.
    pub fn into_config(
        self,
        user: UserConfig,
        chrom_depth_file: Option<PathBuf>,
    ) -> Result<WorkflowConfig, ConfigError> {
        let derived = DerivedConfig {
            genome_size: self.genome_size(),
            total_genome_size: self.total_genome_size(),
            run_dir: self.run_dir,
            alignment_path: self.alignment_path,
            reference_path: self.reference_path,
            chrom_depth_file,
            chromosomes: self.chromosomes,
        };
        WorkflowConfig::new(user, derived)
    }
}

/// Inputs to planning
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub alignment: &'a Path,
    pub reference: &'a Path,
    /// Precomputed `count-bases` output, used instead of scanning the reference
    pub reference_counts: Option<&'a Path>,
    pub run_dir: &'a Path,
}

/// Read the alignment header and reference, and cross-validate them.
///
/// # Errors
///
/// Returns `PlanError::Parse` if an input cannot be read, or
/// `PlanError::ReferenceMismatch` listing every inconsistency found.
pub fn plan(request: &PlanRequest<'_>) -> Result<RunPlan, PlanError> {
    let declared = sam::parse_file(request.alignment)?;

    let counts = if let Some(counts_path) = request.reference_counts {
        info!(path = %counts_path.display(), "Using precomputed reference base counts");
        base_counts::parse_counts_file(counts_path)?
    } else {
        info!(path = %request.reference.display(), "Counting reference bases");
        fasta::count_bases(request.reference)?
    };

    let chromosomes = plan_chromosomes(&declared, &counts)?;
    info!(
        chromosomes = chromosomes.len(),
        "Alignment header is consistent with the reference"
    );

    Ok(RunPlan {
        run_dir: request.run_dir.to_path_buf(),
        alignment_path: request.alignment.to_path_buf(),
        reference_path: request.reference.to_path_buf(),
        chromosomes,
    })
}

/// Match declared alignment sequences against reference contig counts.
///
/// The result keeps alignment header order. Every mismatch is collected
/// before failing so a bad run reports all of them at once.
///
/// # Errors
///
/// Returns `PlanError::DuplicateContig` if the reference repeats a contig
/// name, or `PlanError::ReferenceMismatch`.
pub fn plan_chromosomes(
    declared: &[DeclaredSequence],
    counts: &[ContigBaseCounts],
) -> Result<Vec<ChromosomeInfo>, PlanError> {
    let mut mismatches = Vec::new();
    let mut by_name: HashMap<&str, &ContigBaseCounts> = HashMap::with_capacity(counts.len());

    for contig in counts {
        if by_name.insert(contig.name.as_str(), contig).is_some() {
            return Err(PlanError::DuplicateContig(contig.name.clone()));
        }
        if contig.total == 0 {
            mismatches.push(ReferenceMismatch::EmptyContig {
                name: contig.name.clone(),
            });
        }
    }

    let mut chromosomes = Vec::with_capacity(declared.len());
    for (order, sequence) in declared.iter().enumerate() {
        let Some(contig) = by_name.get(sequence.name.as_str()) else {
            mismatches.push(ReferenceMismatch::MissingContig {
                name: sequence.name.clone(),
            });
            continue;
        };

        if contig.total != sequence.length {
            mismatches.push(ReferenceMismatch::LengthDiffers {
                name: sequence.name.clone(),
                declared: sequence.length,
                reference: contig.total,
            });
            continue;
        }

        debug!(
            chromosome = %sequence.name,
            length = sequence.length,
            known_bases = contig.known,
            "Planned chromosome"
        );
        chromosomes.push(
            ChromosomeInfo::new(sequence.name.clone(), sequence.length, order)
                .with_reference_counts(contig.total, contig.known),
        );
    }

    if !mismatches.is_empty() {
        return Err(PlanError::ReferenceMismatch(mismatches));
    }

    Ok(chromosomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn counts(name: &str, known: u64, total: u64) -> ContigBaseCounts {
        ContigBaseCounts {
            source: "genome.fa".to_string(),
            name: name.to_string(),
            known,
            total,
        }
    }

    #[test]
    fn test_plan_keeps_header_order() {
        let declared = vec![
            DeclaredSequence::new("chr2", 500),
            DeclaredSequence::new("chr1", 1000),
        ];
        let reference = vec![counts("chr1", 900, 1000), counts("chr2", 500, 500)];

        let chromosomes = plan_chromosomes(&declared, &reference).unwrap();
        assert_eq!(chromosomes[0].name, "chr2");
        assert_eq!(chromosomes[0].order, 0);
        assert_eq!(chromosomes[1].name, "chr1");
        assert_eq!(chromosomes[1].order, 1);
        assert_eq!(chromosomes[1].known_bases, 900);
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let declared = vec![DeclaredSequence::new("chr1", 1000)];
        let reference = vec![counts("chr1", 999, 999)];

        let err = plan_chromosomes(&declared, &reference).unwrap_err();
        let PlanError::ReferenceMismatch(mismatches) = &err else {
            panic!("expected ReferenceMismatch, got {err:?}");
        };
        assert_eq!(
            mismatches,
            &vec![ReferenceMismatch::LengthDiffers {
                name: "chr1".to_string(),
                declared: 1000,
                reference: 999,
            }]
        );
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_all_mismatches_reported() {
        let declared = vec![
            DeclaredSequence::new("chr1", 1000),
            DeclaredSequence::new("chr2", 500),
            DeclaredSequence::new("chr3", 10),
        ];
        let reference = vec![
            counts("chr1", 999, 999),
            counts("chr3", 10, 10),
            counts("chrUn", 0, 0),
        ];

        let Err(PlanError::ReferenceMismatch(mismatches)) = plan_chromosomes(&declared, &reference)
        else {
            panic!("expected ReferenceMismatch");
        };
        assert_eq!(mismatches.len(), 3);
        assert!(mismatches.contains(&ReferenceMismatch::EmptyContig {
            name: "chrUn".to_string()
        }));
        assert!(mismatches.contains(&ReferenceMismatch::MissingContig {
            name: "chr2".to_string()
        }));
    }

    #[test]
    fn test_reference_only_contigs_are_ignored() {
        let declared = vec![DeclaredSequence::new("chr1", 1000)];
        let reference = vec![counts("chr1", 1000, 1000), counts("chrEBV", 171_000, 171_823)];

        let chromosomes = plan_chromosomes(&declared, &reference).unwrap();
        assert_eq!(chromosomes.len(), 1);
    }

    #[test]
    fn test_duplicate_reference_contig() {
        let declared = vec![DeclaredSequence::new("chr1", 4)];
        let reference = vec![counts("chr1", 4, 4), counts("chr1", 4, 4)];
        assert!(matches!(
            plan_chromosomes(&declared, &reference),
            Err(PlanError::DuplicateContig(name)) if name == "chr1"
        ));
    }

    #[test]
    fn test_plan_from_files() {
        let mut sam_file = NamedTempFile::with_suffix(".sam").unwrap();
        write!(sam_file, "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:12\n@SQ\tSN:chr2\tLN:4\n").unwrap();
        sam_file.flush().unwrap();

        let mut fasta_file = NamedTempFile::with_suffix(".fa").unwrap();
        write!(fasta_file, ">chr1\nACGTACGT\nNNNN\n>chr2\nacgt\n").unwrap();
        fasta_file.flush().unwrap();

        let run_dir = tempfile::tempdir().unwrap();
        let plan = plan(&PlanRequest {
            alignment: sam_file.path(),
            reference: fasta_file.path(),
            reference_counts: None,
            run_dir: run_dir.path(),
        })
        .unwrap();

        assert_eq!(plan.chromosomes.len(), 2);
        assert_eq!(plan.genome_size(), 12);
        assert_eq!(plan.total_genome_size(), 16);
        assert_eq!(plan.bin_count(5), 3 + 1);

        let config = plan.into_config(UserConfig::default(), None).unwrap();
        assert_eq!(config.derived.genome_size, 12);
        assert_eq!(config.derived.chromosomes[1].label, "chr2");
    }
}
