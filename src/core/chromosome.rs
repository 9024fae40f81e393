use serde::{Deserialize, Serialize};

use crate::utils::validation::sanitize_label;

/// A chromosome as declared by the alignment header and confirmed by the reference.
///
/// `order` is the position of the `@SQ` line in the alignment header, which is
/// the order the alignment source emits records in. Every chromosome-ordered
/// operation (graph emission, consolidation) iterates in this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromosomeInfo {
    /// Sequence name (SN tag in SAM)
    pub name: String,

    /// Filesystem and make-safe label derived from the name
    pub label: String,

    /// Sequence length declared in the alignment header (LN tag in SAM)
    pub length: u64,

    /// Declaration order in the alignment header
    pub order: usize,

    /// Total bases counted in the reference contig
    pub reference_length: u64,

    /// Bases in the reference contig that are one of `ACGTacgt`
    pub known_bases: u64,
}

impl ChromosomeInfo {
    pub fn new(name: impl Into<String>, length: u64, order: usize) -> Self {
        let name = name.into();
        let label = sanitize_label(&name);
        Self {
            name,
            label,
            length,
            order,
            reference_length: length,
            known_bases: 0,
        }
    }

    #[must_use]
    pub fn with_reference_counts(mut self, reference_length: u64, known_bases: u64) -> Self {
        self.reference_length = reference_length;
        self.known_bases = known_bases;
        self
    }
}

/// A `(name, length)` pair from an alignment header, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredSequence {
    pub name: String,
    pub length: u64,
}

impl DeclaredSequence {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Base counts for one reference contig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContigBaseCounts {
    /// File the contig was read from
    pub source: String,
    pub name: String,
    pub known: u64,
    pub total: u64,
}
