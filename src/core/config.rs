//! Workflow configuration: user tunables plus values derived during planning.
//!
//! The configuration is persisted as `config.toml` in the run directory with
//! two tables, `[user]` and `[derived]`. It is written once by `configure` and
//! re-read unmodified by every bin task and by consolidation.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::bins::{bin_count, chromosome_bins, BinId, BinRegion};
use crate::core::chromosome::ChromosomeInfo;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration error: missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("configuration error: invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("configuration error: failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("configuration error: failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Keys that must be present in the persisted `[user]` table
pub const REQUIRED_USER_KEYS: &[&str] = &[
    "bin_size",
    "depth_filter_multiple",
    "min_qscore",
    "max_indel_repeat",
    "min_mapping_quality",
    "min_tier2_mapping_quality",
    "estimate_depth",
    "write_realigned_alignments",
    "caller",
];

/// Keys that must be present in the persisted `[derived]` table
pub const REQUIRED_DERIVED_KEYS: &[&str] = &[
    "run_dir",
    "alignment_path",
    "reference_path",
    "genome_size",
    "total_genome_size",
    "chromosomes",
];

pub const DEFAULT_BIN_SIZE: u64 = 25_000_000;

/// User-supplied tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    /// Size of each bin in bases
    pub bin_size: u64,

    /// Sites deeper than this multiple of the chromosome depth are filtered
    pub depth_filter_multiple: f64,

    /// Minimum call quality
    pub min_qscore: u32,

    /// Indels in repeats longer than this are filtered
    pub max_indel_repeat: u32,

    /// Minimum mapping quality for reads used in calling
    pub min_mapping_quality: u8,

    /// Minimum mapping quality for tier-2 (relaxed) evidence
    pub min_tier2_mapping_quality: u8,

    /// Hard cap on input depth handed to the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input_depth: Option<u32>,

    /// Estimate chromosome depth during configuration
    pub estimate_depth: bool,

    /// Ask the caller to write realigned alignments for each bin
    pub write_realigned_alignments: bool,

    /// Variant caller executable (name on PATH or a path)
    pub caller: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            bin_size: DEFAULT_BIN_SIZE,
            depth_filter_multiple: 3.0,
            min_qscore: 30,
            max_indel_repeat: 8,
            min_mapping_quality: 20,
            min_tier2_mapping_quality: 5,
            max_input_depth: None,
            estimate_depth: true,
            write_realigned_alignments: false,
            caller: "starling2".to_string(),
        }
    }
}

impl UserConfig {
    /// Load user tunables from a TOML file with an optional `[user]` table.
    /// Keys not present keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse` if the file cannot be
    /// read or contains unknown keys or wrongly typed values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct UserFile {
            #[serde(default)]
            user: UserConfig,
        }

        let text = read_file(path)?;
        let file: UserFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(file.user)
    }
}

/// Values computed by planning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedConfig {
    pub run_dir: PathBuf,
    pub alignment_path: PathBuf,
    pub reference_path: PathBuf,

    /// Sum of known bases over the planned chromosomes
    pub genome_size: u64,

    /// Sum of all reference bases over the planned chromosomes
    pub total_genome_size: u64,

    /// Per-chromosome depth table, when depth estimation produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrom_depth_file: Option<PathBuf>,

    /// Chromosomes in alignment header order
    pub chromosomes: Vec<ChromosomeInfo>,
}

/// The complete, validated workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    pub user: UserConfig,
    pub derived: DerivedConfig,
}

impl WorkflowConfig {
    /// Build a configuration and check it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is out of range.
    pub fn new(user: UserConfig, derived: DerivedConfig) -> Result<Self, ConfigError> {
        let config = Self { user, derived };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a persisted configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKeys` listing every absent required key,
    /// `ConfigError::Parse` for malformed TOML, or `ConfigError::InvalidValue`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_file(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// See [`WorkflowConfig::load`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let parse_error = |source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        };

        let table: toml::Table = toml::from_str(text).map_err(parse_error)?;
        let missing = missing_keys(&table);
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let config: Self = toml::from_str(text).map_err(parse_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` if a value cannot be represented in TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Write` on I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_toml_string()?;
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(text.as_bytes()).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(path).map_err(|e| write_error(e.error))?;
        Ok(())
    }

    /// Check value ranges and cross-field invariants
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            reason,
        };

        if self.user.bin_size == 0 {
            return Err(invalid("user.bin_size", "must be at least 1".to_string()));
        }
        if !(self.user.depth_filter_multiple > 0.0) {
            return Err(invalid(
                "user.depth_filter_multiple",
                format!("must be positive, got {}", self.user.depth_filter_multiple),
            ));
        }
        if self.user.caller.trim().is_empty() {
            return Err(invalid("user.caller", "must not be empty".to_string()));
        }
        if self.derived.chromosomes.is_empty() {
            return Err(invalid(
                "derived.chromosomes",
                "no chromosomes were planned".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        let mut names = HashSet::new();
        let mut last_order = None;
        for chrom in &self.derived.chromosomes {
            if chrom.length == 0 {
                return Err(invalid(
                    "derived.chromosomes",
                    format!("chromosome '{}' has zero length", chrom.name),
                ));
            }
            if !names.insert(chrom.name.as_str()) {
                return Err(invalid(
                    "derived.chromosomes",
                    format!("chromosome '{}' is listed twice", chrom.name),
                ));
            }
            if !labels.insert(chrom.label.as_str()) {
                return Err(invalid(
                    "derived.chromosomes",
                    format!(
                        "chromosome '{}' maps to label '{}' which is already in use",
                        chrom.name, chrom.label
                    ),
                ));
            }
            if last_order.is_some_and(|last| chrom.order <= last) {
                return Err(invalid(
                    "derived.chromosomes",
                    format!("chromosome '{}' is out of header order", chrom.name),
                ));
            }
            last_order = Some(chrom.order);

            if bin_count(chrom.length, self.user.bin_size) > u64::from(u32::MAX) {
                return Err(invalid(
                    "user.bin_size",
                    format!("too small for chromosome '{}'", chrom.name),
                ));
            }
        }

        Ok(())
    }

    /// Look up a chromosome by its label
    #[must_use]
    pub fn chromosome_by_label(&self, label: &str) -> Option<&ChromosomeInfo> {
        self.derived.chromosomes.iter().find(|c| c.label == label)
    }

    /// Bins of one chromosome, in order
    pub fn bins(&self, chrom: &ChromosomeInfo) -> impl Iterator<Item = BinRegion> {
        chromosome_bins(chrom.length, self.user.bin_size)
    }

    /// Region covered by `bin` if it exists on `chrom`
    #[must_use]
    pub fn bin_region(&self, chrom: &ChromosomeInfo, bin: BinId) -> Option<BinRegion> {
        (bin.index() < bin_count(chrom.length, self.user.bin_size))
            .then(|| BinRegion::new(bin, self.user.bin_size))
    }

    /// Every `(chromosome, bin)` pair in chromosome order, then bin order
    pub fn all_bins(&self) -> impl Iterator<Item = (&ChromosomeInfo, BinRegion)> {
        self.derived
            .chromosomes
            .iter()
            .flat_map(move |chrom| self.bins(chrom).map(move |region| (chrom, region)))
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Every required key absent from the raw table, as `namespace.key`
fn missing_keys(table: &toml::Table) -> Vec<String> {
    let mut missing = Vec::new();
    for (namespace, required) in [("user", REQUIRED_USER_KEYS), ("derived", REQUIRED_DERIVED_KEYS)]
    {
        let section = table.get(namespace).and_then(toml::Value::as_table);
        for key in required {
            if !section.is_some_and(|s| s.contains_key(*key)) {
                missing.push(format!("{namespace}.{key}"));
            }
        }
    }
    missing
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config(
        run_dir: &Path,
        chroms: &[(&str, u64)],
        bin_size: u64,
    ) -> WorkflowConfig {
        let chromosomes: Vec<ChromosomeInfo> = chroms
            .iter()
            .enumerate()
            .map(|(i, (name, length))| {
                ChromosomeInfo::new(*name, *length, i).with_reference_counts(*length, *length)
            })
            .collect();
        let genome_size = chromosomes.iter().map(|c| c.known_bases).sum();

        let user = UserConfig {
            bin_size,
            ..UserConfig::default()
        };
        let derived = DerivedConfig {
            run_dir: run_dir.to_path_buf(),
            alignment_path: PathBuf::from("/data/sample.bam"),
            reference_path: PathBuf::from("/data/genome.fa"),
            genome_size,
            total_genome_size: genome_size,
            chrom_depth_file: None,
            chromosomes,
        };
        WorkflowConfig::new(user, derived).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let mut config = sample_config(
            Path::new("/runs/a"),
            &[("chr1", 2_500_000), ("chr2", 500_000)],
            1_000_000,
        );
        config.user.max_input_depth = Some(250);
        config.derived.chrom_depth_file = Some(PathBuf::from("/runs/a/chrom_depth.txt"));

        let text = config.to_toml_string().unwrap();
        let parsed = WorkflowConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.to_toml_string().unwrap(), text);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 1000)], 100);
        let path = dir.path().join("config.toml");
        config.save(&path).unwrap();

        let loaded = WorkflowConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_keys_are_aggregated() {
        let text = r#"
[user]
bin_size = 100
caller = "starling2"

[derived]
run_dir = "/runs/a"
genome_size = 10
"#;
        let err = WorkflowConfig::from_toml_str(text).unwrap_err();
        let ConfigError::MissingKeys(keys) = err else {
            panic!("expected MissingKeys, got {err:?}");
        };
        assert!(keys.contains(&"user.depth_filter_multiple".to_string()));
        assert!(keys.contains(&"user.estimate_depth".to_string()));
        assert!(keys.contains(&"derived.alignment_path".to_string()));
        assert!(keys.contains(&"derived.chromosomes".to_string()));
        assert!(!keys.contains(&"user.bin_size".to_string()));
        assert!(!keys.contains(&"derived.run_dir".to_string()));
        assert_eq!(keys.len(), 7 + 4);
    }

    #[test]
    fn test_missing_namespace_reports_every_key() {
        let err = WorkflowConfig::from_toml_str("").unwrap_err();
        let ConfigError::MissingKeys(keys) = err else {
            panic!("expected MissingKeys");
        };
        assert_eq!(keys.len(), REQUIRED_USER_KEYS.len() + REQUIRED_DERIVED_KEYS.len());
    }

    #[test]
    fn test_zero_bin_size_rejected() {
        let mut config = sample_config(Path::new("/runs/a"), &[("chr1", 1000)], 100);
        config.user.bin_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "user.bin_size"
        ));
    }

    #[test]
    fn test_label_collision_rejected() {
        let config = sample_config(Path::new("/runs/a"), &[("chr1", 1000)], 100);
        let mut derived = config.derived.clone();
        derived.chromosomes = vec![
            ChromosomeInfo::new("HLA:1", 100, 0),
            ChromosomeInfo::new("HLA*1", 100, 1),
        ];
        let err = WorkflowConfig::new(config.user.clone(), derived).unwrap_err();
        assert!(err.to_string().contains("label 'HLA_1'"));
    }

    #[test]
    fn test_user_config_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.toml");
        std::fs::write(&path, "[user]\nbin_size = 1000000\nmax_input_depth = 90\n").unwrap();

        let user = UserConfig::load(&path).unwrap();
        assert_eq!(user.bin_size, 1_000_000);
        assert_eq!(user.max_input_depth, Some(90));
        assert_eq!(user.caller, "starling2");
        assert!(user.estimate_depth);
    }

    #[test]
    fn test_user_config_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.toml");
        std::fs::write(&path, "[user]\nbinsize = 10\n").unwrap();
        assert!(matches!(UserConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_all_bins_order() {
        let config = sample_config(
            Path::new("/runs/a"),
            &[("chr1", 2_500_000), ("chr2", 500_000)],
            1_000_000,
        );
        let order: Vec<String> = config
            .all_bins()
            .map(|(c, r)| format!("{}/{}", c.name, r.bin))
            .collect();
        assert_eq!(order, vec!["chr1/0000", "chr1/0001", "chr1/0002", "chr2/0000"]);
    }

    #[test]
    fn test_bin_region_out_of_range() {
        let config = sample_config(Path::new("/runs/a"), &[("chr1", 2_500_000)], 1_000_000);
        let chrom = &config.derived.chromosomes[0];
        assert!(config.bin_region(chrom, BinId(2)).is_some());
        assert!(config.bin_region(chrom, BinId(3)).is_none());
    }
}
