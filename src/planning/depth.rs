//! Per-chromosome sequencing depth estimation.
//!
//! The average aligned length of a record is estimated from a random ~10%
//! subsample of mapped records, capped at 200,000 sampled records. A sample
//! of 100,000 records or fewer is not trusted and an exact pass over the
//! first 200,000 mapped records is used instead. Depth for a chromosome is
//! then `mapped_records * average_length / chromosome_length`.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::chromosome::ChromosomeInfo;
use crate::parsing::sam::ParseError;
use crate::planning::alignment::{AlignmentSource, MappedRecord};

/// Fraction of mapped records kept by the approximate pass
pub const SAMPLE_FRACTION: f64 = 0.1;

/// Records examined before either pass stops
pub const MAX_EXAMINED_RECORDS: u64 = 200_000;

/// The approximate pass is trusted only above this many examined records
pub const MIN_RELIABLE_RECORDS: u64 = 100_000;

const SAMPLE_SEED: u64 = 0x5EED_DE97;

#[derive(Error, Debug)]
pub enum DepthError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("resource error: failed to read alignment records from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: depth estimation requires SAM or BAM input: '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("resource error: failed to write depth table '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which pass produced the average record length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatePass {
    Sampled,
    Exact,
}

/// Accumulated reference span over examined records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LengthSample {
    pub records: u64,
    pub total_span: u64,
}

impl LengthSample {
    fn add(&mut self, record: MappedRecord) {
        self.records += 1;
        self.total_span += record.reference_span;
    }

    /// Mean reference span, or `None` for an empty sample
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.records > 0).then(|| self.total_span as f64 / self.records as f64)
    }
}

/// Estimated depth of one chromosome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChromosomeDepth {
    pub name: String,
    pub mapped_records: u64,
    pub depth: f64,
}

/// Result of depth estimation for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthEstimate {
    /// Mean reference span of a mapped record
    pub average_record_length: f64,
    /// Records the accepted pass examined
    pub sample_count: u64,
    pub pass: EstimatePass,
    /// Chromosomes long enough to host a full record, in chromosome order
    pub chromosomes: Vec<ChromosomeDepth>,
}

impl DepthEstimate {
    /// Depth of a chromosome, or `None` if it was excluded
    #[must_use]
    pub fn depth(&self, name: &str) -> Option<f64> {
        self.chromosomes
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.depth)
    }

    /// Render the depth table read by the variant caller: `name\tdepth`
    #[must_use]
    pub fn format_table(&self) -> String {
        self.chromosomes
            .iter()
            .map(|c| format!("{}\t{:.3}\n", c.name, c.depth))
            .collect()
    }

    /// Write the depth table atomically.
    ///
    /// # Errors
    ///
    /// Returns `DepthError::Write` on I/O failure.
    pub fn write_table(&self, path: &Path) -> Result<(), DepthError> {
        let write_error = |source| DepthError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(self.format_table().as_bytes())
            .map_err(write_error)?;
        temp.persist(path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

/// Two-pass depth estimator
#[derive(Debug, Clone)]
pub struct DepthEstimator {
    pub sample_fraction: f64,
    pub max_examined: u64,
    pub min_reliable: u64,
    pub seed: u64,
}

impl Default for DepthEstimator {
    fn default() -> Self {
        Self {
            sample_fraction: SAMPLE_FRACTION,
            max_examined: MAX_EXAMINED_RECORDS,
            min_reliable: MIN_RELIABLE_RECORDS,
            seed: SAMPLE_SEED,
        }
    }
}

impl DepthEstimator {
    /// Approximate pass: random subsample, stopping at `max_examined` kept records.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if the source cannot be read.
    pub fn sample_pass(
        &self,
        source: &mut dyn AlignmentSource,
    ) -> Result<LengthSample, DepthError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut sample = LengthSample::default();
        let max_examined = self.max_examined;
        let fraction = self.sample_fraction;

        source.visit_mapped(&mut |record| {
            if !rng.random_bool(fraction) {
                return ControlFlow::Continue(());
            }
            sample.add(record);
            if sample.records >= max_examined {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(sample)
    }

    /// Exact pass: every mapped record, stopping at `max_examined` records.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if the source cannot be read.
    pub fn exact_pass(&self, source: &mut dyn AlignmentSource) -> Result<LengthSample, DepthError> {
        let mut sample = LengthSample::default();
        let max_examined = self.max_examined;

        source.visit_mapped(&mut |record| {
            sample.add(record);
            if sample.records >= max_examined {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(sample)
    }

    /// Count mapped records per reference sequence id over the whole source.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if the source cannot be read.
    pub fn count_mapped(
        &self,
        source: &mut dyn AlignmentSource,
        reference_count: usize,
    ) -> Result<Vec<u64>, DepthError> {
        let mut counts = vec![0u64; reference_count];
        source.visit_mapped(&mut |record| {
            if let Some(count) = counts.get_mut(record.reference_sequence_id) {
                *count += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(counts)
    }

    /// Average record length, falling back to the exact pass when the
    /// subsample is too small to trust.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if the source cannot be read.
    pub fn average_record_length(
        &self,
        source: &mut dyn AlignmentSource,
    ) -> Result<Option<(f64, u64, EstimatePass)>, DepthError> {
        let sampled = self.sample_pass(source)?;
        debug!(
            records = sampled.records,
            total_span = sampled.total_span,
            "Sampled record lengths"
        );

        if sampled.records > self.min_reliable {
            return Ok(sampled
                .average()
                .map(|avg| (avg, sampled.records, EstimatePass::Sampled)));
        }

        info!(
            sampled = sampled.records,
            required = self.min_reliable,
            "Record sample too small, measuring lengths exactly"
        );
        let exact = self.exact_pass(source)?;
        Ok(exact
            .average()
            .map(|avg| (avg, exact.records, EstimatePass::Exact)))
    }

    /// Estimate depth for each chromosome.
    ///
    /// `chromosomes[i].order` must be the record reference sequence id of that
    /// chromosome in `source`. Mapped record counts come from the source's
    /// index when it has one, otherwise from a full scan. Returns `None` when
    /// the source has no mapped records.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if the source cannot be read.
    pub fn estimate(
        &self,
        source: &mut dyn AlignmentSource,
        chromosomes: &[ChromosomeInfo],
    ) -> Result<Option<DepthEstimate>, DepthError> {
        let Some((average, sample_count, pass)) = self.average_record_length(source)? else {
            warn!("No mapped records found, skipping chromosome depth estimation");
            return Ok(None);
        };

        let mapped = match source.indexed_mapped_counts()? {
            Some(counts) => counts,
            None => {
                info!("No alignment index found, counting mapped records with a full scan");
                let reference_count = chromosomes.iter().map(|c| c.order + 1).max().unwrap_or(0);
                self.count_mapped(source, reference_count)?
            }
        };

        let mut depths = Vec::new();
        for chrom in chromosomes {
            #[allow(clippy::cast_precision_loss)]
            let length = chrom.length as f64;
            if length < average {
                debug!(
                    chromosome = %chrom.name,
                    length = chrom.length,
                    "Chromosome shorter than average record, excluded from depth table"
                );
                continue;
            }

            let mapped_records = mapped.get(chrom.order).copied().unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let depth = (mapped_records as f64 * average) / length;
            depths.push(ChromosomeDepth {
                name: chrom.name.clone(),
                mapped_records,
                depth,
            });
        }

        info!(
            average_record_length = average,
            sample_count,
            pass = ?pass,
            chromosomes = depths.len(),
            "Estimated chromosome depth"
        );

        Ok(Some(DepthEstimate {
            average_record_length: average,
            sample_count,
            pass,
            chromosomes: depths,
        }))
    }
}
