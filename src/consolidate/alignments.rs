use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use noodles::bam;
use noodles::sam;
use tracing::{debug, info, warn};

use crate::consolidate::indexer::Indexer;
use crate::consolidate::{
    build_index, create_results_dir, io_error, persist, remove_partials, temp_in,
    ConsolidateError, StageOutcome,
};
use crate::core::config::WorkflowConfig;
use crate::core::layout::RunLayout;

/// Bytes of fixed-width fields at the start of every BAM record
const FIXED_FIELDS_LEN: usize = 32;

/// Realigned partials that exist, in chromosome then bin order
#[must_use]
pub fn alignment_partials(config: &WorkflowConfig) -> Vec<PathBuf> {
    let layout = RunLayout::new(&config.derived.run_dir);
    config
        .all_bins()
        .map(|(chrom, region)| layout.bin(&chrom.label, region.bin).realigned())
        .filter(|p| p.is_file())
        .collect()
}

/// Merge the realigned partials into `results/realigned.bam` and index it.
///
/// Partials are written unsorted by the caller, so each one is sorted by
/// position and the sorted runs are then merged. Records are copied in their
/// encoded form. A read realigned in one bin may start before that bin begins,
/// so the merge cannot simply append partials. The header of the first
/// partial is used for the merged file and every other partial must declare
/// the same reference sequences. Bins without a partial are skipped.
///
/// # Errors
///
/// Returns `ConsolidateError` if a partial cannot be read, or on failure to
/// write, index or promote the merged file.
pub fn consolidate_alignments(
    config: &WorkflowConfig,
    indexer: &dyn Indexer,
) -> Result<StageOutcome, ConsolidateError> {
    let layout = RunLayout::new(&config.derived.run_dir);
    let output = layout.final_alignments();
    let index_dest = layout.final_alignments_index();

    let partials = alignment_partials(config);
    let Some(first) = partials.first() else {
        if output.is_file() && index_dest.is_file() {
            info!(output = %output.display(), "Alignments already consolidated");
            return Ok(StageOutcome::AlreadyConsolidated { output });
        }
        if config.user.write_realigned_alignments {
            warn!("No realigned alignment partials found");
        }
        return Ok(StageOutcome::Skipped);
    };

    create_results_dir(&layout.results_dir())?;
    info!(partials = partials.len(), "Merging realigned alignments");

    let first_header = open_bam(first)?.read_header().map_err(merge_error(first))?;
    let header = coordinate_sorted(&first_header).map_err(merge_error(first))?;

    let mut runs = Vec::with_capacity(partials.len());
    for partial in &partials {
        let run = read_sorted_run(partial, &first_header)?;
        debug!(partial = %partial.display(), records = run.len(), "Sorted partial");
        runs.push(run);
    }

    let mut temp = temp_in(&layout.results_dir(), ".bam")?;
    {
        let mut writer = bam::io::Writer::new(temp.as_file_mut());
        writer.write_header(&header).map_err(io_error(&output))?;
        let records = merge_runs(runs, writer.get_mut()).map_err(io_error(&output))?;
        writer.try_finish().map_err(io_error(&output))?;
        debug!(records, "Merged alignment records");
    }
    temp.as_file().sync_all().map_err(io_error(&output))?;

    let index = build_index(temp.path(), &index_dest, |src, dst| {
        indexer.index_alignments(src, dst)
    })?;
    persist(temp, &output)?;
    persist(index, &index_dest)?;
    remove_partials(&partials)?;

    info!(output = %output.display(), "Alignments consolidated");
    Ok(StageOutcome::Merged {
        partials: partials.len(),
        output,
    })
}

/// One BAM record exactly as encoded, without its block size prefix
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawRecord {
    key: (usize, usize),
    data: Vec<u8>,
}

impl RawRecord {
    /// `(reference id, 1-based start)`. Records without a reference sort
    /// last and records without a start sort first within their reference.
    fn key_of(data: &[u8]) -> (usize, usize) {
        let field =
            |at: usize| i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let reference_sequence_id = usize::try_from(field(0)).unwrap_or(usize::MAX);
        let start = usize::try_from(field(4)).map_or(0, |pos| pos + 1);
        (reference_sequence_id, start)
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Option<Self>> {
        let mut block_size = [0; 4];
        match reader.read_exact(&mut block_size) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let len = usize::try_from(u32::from_le_bytes(block_size))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if len < FIXED_FIELDS_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("record block of {len} bytes is shorter than the fixed fields"),
            ));
        }

        let mut data = vec![0; len];
        reader.read_exact(&mut data)?;
        Ok(Some(Self {
            key: Self::key_of(&data),
            data,
        }))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let block_size = u32::try_from(self.data.len())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        writer.write_all(&block_size.to_le_bytes())?;
        writer.write_all(&self.data)
    }
}

fn merge_error(path: &Path) -> impl Fn(io::Error) -> ConsolidateError + '_ {
    move |source| ConsolidateError::Alignments {
        path: path.to_path_buf(),
        source,
    }
}

fn open_bam(
    path: &Path,
) -> Result<bam::io::Reader<noodles::bgzf::Reader<File>>, ConsolidateError> {
    let file = File::open(path).map_err(io_error(path))?;
    Ok(bam::io::Reader::new(file))
}

/// Every record of one partial, stably sorted by position
fn read_sorted_run(
    path: &Path,
    expected: &sam::Header,
) -> Result<Vec<RawRecord>, ConsolidateError> {
    let mut reader = open_bam(path)?;
    let header = reader.read_header().map_err(merge_error(path))?;

    // Reference ids are copied verbatim, so they must mean the same thing in every partial
    if !header
        .reference_sequences()
        .keys()
        .eq(expected.reference_sequences().keys())
    {
        return Err(merge_error(path)(io::Error::new(
            io::ErrorKind::InvalidData,
            "reference sequences differ from the first partial",
        )));
    }

    let mut run = Vec::new();
    while let Some(record) = RawRecord::read_from(reader.get_mut()).map_err(merge_error(path))? {
        run.push(record);
    }
    run.sort_by_key(|record| record.key);
    Ok(run)
}

/// K-way merge of sorted runs. Equal keys keep run order, then record order.
fn merge_runs<W: Write>(runs: Vec<Vec<RawRecord>>, out: &mut W) -> io::Result<u64> {
    let mut runs: Vec<_> = runs.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<RawRecord>> = runs.iter_mut().map(Iterator::next).collect();
    let mut heap: BinaryHeap<_> = heads
        .iter()
        .enumerate()
        .filter_map(|(i, head)| head.as_ref().map(|record| Reverse((record.key, i))))
        .collect();

    let mut written = 0;
    while let Some(Reverse((_, i))) = heap.pop() {
        if let Some(record) = heads[i].take() {
            record.write_to(out)?;
            written += 1;
        }
        if let Some(next) = runs[i].next() {
            heap.push(Reverse((next.key, i)));
            heads[i] = Some(next);
        }
    }
    Ok(written)
}

/// Copy of `header` with `@HD SO:coordinate`, adding an `@HD` line if needed
fn coordinate_sorted(header: &sam::Header) -> io::Result<sam::Header> {
    let mut writer = sam::io::Writer::new(Vec::new());
    writer.write_header(header)?;
    let text = String::from_utf8(writer.into_inner())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut lines = Vec::new();
    for line in text.lines() {
        match line.strip_prefix("@HD") {
            Some(fields) => {
                let mut hd: Vec<&str> = vec!["@HD"];
                hd.extend(
                    fields
                        .split('\t')
                        .filter(|f| !f.is_empty() && !f.starts_with("SO:")),
                );
                hd.push("SO:coordinate");
                lines.push(hd.join("\t"));
            }
            None => lines.push(line.to_string()),
        }
    }
    if !lines.first().is_some_and(|l| l.starts_with("@HD")) {
        lines.insert(0, "@HD\tVN:1.6\tSO:coordinate".to_string());
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text.parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
