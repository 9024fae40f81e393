//! Mapped-record access for depth estimation.
//!
//! [`AlignmentSource`] is the seam between the estimator and alignment file
//! I/O. [`NoodlesAlignmentSource`] reads SAM and BAM with noodles; tests
//! substitute in-memory sources.

use std::io::{self, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use noodles::bam::{self, bai};
use noodles::csi::{self, binning_index::BinningIndex};
use noodles::sam::alignment::record::Cigar as _;
use noodles::sam::alignment::Record as AlignmentRecord;
use noodles::sam;
use tracing::debug;

use crate::parsing::sam::{open_file, AlignmentFormat};
use crate::planning::depth::DepthError;

/// The parts of a mapped alignment record the estimator needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRecord {
    /// Index of the reference sequence in the header's `@SQ` order
    pub reference_sequence_id: usize,
    /// Reference bases consumed by the alignment (M, D, N, =, X operations)
    pub reference_span: u64,
}

/// A stream of mapped alignment records that can be scanned repeatedly.
pub trait AlignmentSource {
    /// Visit mapped records from the start of the source, in file order,
    /// until the visitor returns `ControlFlow::Break` or records run out.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if records cannot be read.
    fn visit_mapped(
        &mut self,
        visitor: &mut dyn FnMut(MappedRecord) -> ControlFlow<()>,
    ) -> Result<(), DepthError>;

    /// Mapped record count per reference sequence id, read from an index
    /// instead of the records. `None` when no index is available.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if an index exists but cannot be read.
    fn indexed_mapped_counts(&self) -> Result<Option<Vec<u64>>, DepthError> {
        Ok(None)
    }
}

/// SAM/BAM file read with noodles; every scan reopens the file.
#[derive(Debug, Clone)]
pub struct NoodlesAlignmentSource {
    path: PathBuf,
    format: AlignmentFormat,
}

impl NoodlesAlignmentSource {
    /// # Errors
    ///
    /// Returns `DepthError::UnsupportedFormat` for CRAM, which needs the
    /// reference to decode records, or a parse error for unknown extensions.
    pub fn new(path: &Path) -> Result<Self, DepthError> {
        let format = AlignmentFormat::from_path(path)?;
        if format == AlignmentFormat::Cram {
            return Err(DepthError::UnsupportedFormat(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    fn read_error(&self, source: io::Error) -> DepthError {
        DepthError::Read {
            path: self.path.clone(),
            source,
        }
    }

    /// `sample.bam.bai`, `sample.bam.csi` or `sample.bai`, whichever exists first
    fn index_path(&self) -> Option<PathBuf> {
        let appended = |ext: &str| {
            let mut name = self.path.clone().into_os_string();
            name.push(ext);
            PathBuf::from(name)
        };
        [
            appended(".bai"),
            appended(".csi"),
            self.path.with_extension("bai"),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }
}

impl AlignmentSource for NoodlesAlignmentSource {
    fn visit_mapped(
        &mut self,
        visitor: &mut dyn FnMut(MappedRecord) -> ControlFlow<()>,
    ) -> Result<(), DepthError> {
        let file = open_file(&self.path)?;

        match self.format {
            AlignmentFormat::Bam => {
                let mut reader = bam::io::Reader::new(file);
                let header = reader.read_header().map_err(|e| self.read_error(e))?;
                for result in reader.records() {
                    let record = result.map_err(|e| self.read_error(e))?;
                    let mapped = mapped_record(&record, &header).map_err(|e| self.read_error(e))?;
                    if let Some(mapped) = mapped {
                        if visitor(mapped).is_break() {
                            break;
                        }
                    }
                }
            }
            AlignmentFormat::Sam => {
                let mut reader = sam::io::Reader::new(BufReader::new(file));
                let header = reader.read_header().map_err(|e| self.read_error(e))?;
                for result in reader.records() {
                    let record = result.map_err(|e| self.read_error(e))?;
                    let mapped = mapped_record(&record, &header).map_err(|e| self.read_error(e))?;
                    if let Some(mapped) = mapped {
                        if visitor(mapped).is_break() {
                            break;
                        }
                    }
                }
            }
            AlignmentFormat::Cram => {
                return Err(DepthError::UnsupportedFormat(self.path.clone()));
            }
        }

        Ok(())
    }

    /// Counts come from the index metadata, so like `samtools idxstats` they
    /// include secondary and supplementary records.
    fn indexed_mapped_counts(&self) -> Result<Option<Vec<u64>>, DepthError> {
        if self.format != AlignmentFormat::Bam {
            return Ok(None);
        }
        let Some(index_path) = self.index_path() else {
            return Ok(None);
        };

        let read_error = |source| DepthError::Read {
            path: index_path.clone(),
            source,
        };
        let index: Box<dyn BinningIndex> =
            if index_path.extension().is_some_and(|ext| ext == "csi") {
                Box::new(csi::read(&index_path).map_err(read_error)?)
            } else {
                Box::new(bai::read(&index_path).map_err(read_error)?)
            };

        debug!(index = %index_path.display(), "Reading mapped record counts from index");
        let counts = index
            .reference_sequences()
            .map(|r| r.metadata().map_or(0, |m| m.mapped_record_count()))
            .collect();
        Ok(Some(counts))
    }
}

/// Extract a primary mapped record, or `None` for records that do not count
fn mapped_record(
    record: &dyn AlignmentRecord,
    header: &sam::Header,
) -> io::Result<Option<MappedRecord>> {
    let flags = record.flags()?;
    if flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() {
        return Ok(None);
    }

    let Some(reference_sequence_id) = record.reference_sequence_id(header).transpose()? else {
        return Ok(None);
    };

    let mut reference_span = 0u64;
    for result in record.cigar().iter() {
        let op = result?;
        if op.kind().consumes_reference() {
            reference_span += op.len() as u64;
        }
    }

    Ok(Some(MappedRecord {
        reference_sequence_id,
        reference_span,
    }))
}
