//! Readers for the inputs a run is planned from.
//!
//! - **SAM/BAM/CRAM files**: `@SQ` lines from the alignment header, in declaration order
//! - **FASTA files**: per-contig known/total base counts
//! - **Base counts tables**: the tab-delimited form of those counts
//!
//! ## Example
//!
//! ```rust,no_run
//! use binflow::parsing::{fasta, sam};
//! use std::path::Path;
//!
//! let sequences = sam::parse_file(Path::new("sample.bam")).unwrap();
//! let counts = fasta::count_bases(Path::new("genome.fa")).unwrap();
//! ```

pub mod base_counts;
pub mod fasta;
pub mod sam;
