//! Paths inside a run directory.
//!
//! ```text
//! <run>/config.toml
//! <run>/Makefile
//! <run>/chrom_depth.txt
//! <run>/workflow.complete
//! <run>/chromosomes/<label>/bins/<bin>/{variants.vcf.gz,realigned.bam,caller.log,bin.complete}
//! <run>/results/{variants.vcf.gz,variants.vcf.gz.tbi,realigned.bam,realigned.bam.bai}
//! ```

use std::path::{Path, PathBuf};

use crate::core::bins::BinId;

pub const CONFIG_FILE: &str = "config.toml";
pub const MAKEFILE: &str = "Makefile";
pub const DEPTH_FILE: &str = "chrom_depth.txt";
pub const WORKFLOW_MARKER: &str = "workflow.complete";

const BIN_MARKER: &str = "bin.complete";
const VARIANTS_FILE: &str = "variants.vcf.gz";
const REALIGNED_FILE: &str = "realigned.bam";
const CALLER_LOG: &str = "caller.log";

/// Path builder rooted at a run directory.
///
/// An empty root yields paths relative to the run directory, which is how the
/// generated Makefile names its targets.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout with paths relative to the run directory
    #[must_use]
    pub fn relative() -> Self {
        Self::new(PathBuf::new())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    #[must_use]
    pub fn makefile(&self) -> PathBuf {
        self.root.join(MAKEFILE)
    }

    #[must_use]
    pub fn depth_file(&self) -> PathBuf {
        self.root.join(DEPTH_FILE)
    }

    #[must_use]
    pub fn workflow_marker(&self) -> PathBuf {
        self.root.join(WORKFLOW_MARKER)
    }

    #[must_use]
    pub fn chromosome_dir(&self, label: &str) -> PathBuf {
        self.root.join("chromosomes").join(label)
    }

    #[must_use]
    pub fn bin(&self, label: &str, bin: BinId) -> BinPaths {
        BinPaths::new(self.chromosome_dir(label).join("bins").join(bin.to_string()))
    }

    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    #[must_use]
    pub fn final_variants(&self) -> PathBuf {
        self.results_dir().join(VARIANTS_FILE)
    }

    #[must_use]
    pub fn final_variants_index(&self) -> PathBuf {
        self.results_dir().join(format!("{VARIANTS_FILE}.tbi"))
    }

    #[must_use]
    pub fn final_alignments(&self) -> PathBuf {
        self.results_dir().join(REALIGNED_FILE)
    }

    #[must_use]
    pub fn final_alignments_index(&self) -> PathBuf {
        self.results_dir().join(format!("{REALIGNED_FILE}.bai"))
    }
}

/// Files owned by one bin task. Each bin has its own directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinPaths {
    pub dir: PathBuf,
}

impl BinPaths {
    fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn marker(&self) -> PathBuf {
        self.dir.join(BIN_MARKER)
    }

    #[must_use]
    pub fn variants(&self) -> PathBuf {
        self.dir.join(VARIANTS_FILE)
    }

    #[must_use]
    pub fn realigned(&self) -> PathBuf {
        self.dir.join(REALIGNED_FILE)
    }

    #[must_use]
    pub fn caller_log(&self) -> PathBuf {
        self.dir.join(CALLER_LOG)
    }
}
