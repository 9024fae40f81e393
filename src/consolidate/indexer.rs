use std::io;
use std::path::Path;

use noodles::bam::{self, bai};
use noodles::csi::binning_index::index::reference_sequence::{bin::Chunk, index::LinearIndex};
use noodles::csi::binning_index::Indexer as BinningIndexer;
use noodles::sam::{self, alignment::Record as _};
use noodles::{tabix, vcf};

/// Builds the index that accompanies a consolidated file
pub trait Indexer {
    /// Write a tabix index of the BGZF-compressed VCF at `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `src` cannot be read or is not sorted.
    fn index_variants(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Write a BAI index of the coordinate-sorted BAM at `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `src` cannot be read or is not sorted.
    fn index_alignments(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

/// Indexes with noodles
#[derive(Debug, Clone, Copy, Default)]
pub struct NoodlesIndexer;

impl Indexer for NoodlesIndexer {
    fn index_variants(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let index = vcf::index(src)?;
        tabix::write(dst, &index)
    }

    fn index_alignments(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let index = build_bai(src)?;
        bai::write(dst, &index)
    }
}

fn is_coordinate_sorted(header: &sam::Header) -> bool {
    use sam::header::record::value::map::header::{sort_order, tag};

    header
        .header()
        .and_then(|hdr| hdr.other_fields().get(&tag::SORT_ORDER))
        .is_some_and(|sort_order| sort_order == sort_order::COORDINATE)
}

/// Walk the records of a sorted BAM and bin each one by its virtual position span
fn build_bai(src: &Path) -> io::Result<bai::Index> {
    let mut reader = bam::io::reader::Builder.build_from_path(src)?;
    let header = reader.read_header()?;

    if !is_coordinate_sorted(&header) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("'{}' is not coordinate-sorted", src.display()),
        ));
    }

    let mut indexer = BinningIndexer::<LinearIndex>::default();
    let mut record = bam::Record::default();
    let mut start_position = reader.get_ref().virtual_position();

    while reader.read_record(&mut record)? != 0 {
        let end_position = reader.get_ref().virtual_position();
        let chunk = Chunk::new(start_position, end_position);

        let context = match (
            record.reference_sequence_id().transpose()?,
            record.alignment_start().transpose()?,
            record.alignment_end().transpose()?,
        ) {
            (Some(id), Some(start), Some(end)) => {
                Some((id, start, end, !record.flags().is_unmapped()))
            }
            _ => None,
        };
        indexer.add_record(context, chunk)?;

        start_position = end_position;
    }

    Ok(indexer.build(header.reference_sequences().len()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use noodles::csi::binning_index::{BinningIndex as _, ReferenceSequence as _};
    use std::cell::RefCell;
    use std::fs::File;
    use std::path::PathBuf;

    /// Writes a placeholder index and records what it was asked to index
    #[derive(Default)]
    pub(crate) struct FakeIndexer {
        pub fail: bool,
        pub indexed: RefCell<Vec<(PathBuf, Vec<u8>)>>,
    }

    impl FakeIndexer {
        fn index(&self, src: &Path, dst: &Path) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::other("index failed"));
            }
            self.indexed
                .borrow_mut()
                .push((src.to_path_buf(), std::fs::read(src)?));
            std::fs::write(dst, b"index")
        }
    }

    impl Indexer for FakeIndexer {
        fn index_variants(&self, src: &Path, dst: &Path) -> io::Result<()> {
            self.index(src, dst)
        }

        fn index_alignments(&self, src: &Path, dst: &Path) -> io::Result<()> {
            self.index(src, dst)
        }
    }

    /// Encode SAM text as BAM
    pub(crate) fn write_bam_from_sam(path: &Path, text: &str) {
        use noodles::sam::alignment::io::Write as _;

        let mut reader = sam::io::Reader::new(text.as_bytes());
        let header = reader.read_header().unwrap();

        let mut writer = bam::io::Writer::new(File::create(path).unwrap());
        writer.write_alignment_header(&header).unwrap();
        for result in reader.records() {
            writer
                .write_alignment_record(&header, &result.unwrap())
                .unwrap();
        }
        writer.finish(&header).unwrap();
    }

    #[test]
    fn test_noodles_indexer_builds_tabix_index() {
        use crate::consolidate::bgzf::tests::write_bgzf;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("calls.vcf.gz");
        let dst = dir.path().join("calls.vcf.gz.tbi");
        write_bgzf(
            &src,
            "##fileformat=VCFv4.3\n\
             ##contig=<ID=chr1,length=1000>\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
             chr1\t10\t.\tA\tC\t50\tPASS\t.\n\
             chr1\t500\t.\tG\tT\t50\tPASS\t.\n",
        );

        NoodlesIndexer.index_variants(&src, &dst).unwrap();
        let index = tabix::read(&dst).unwrap();
        assert_eq!(index.reference_sequences().len(), 1);
    }

    #[test]
    fn test_noodles_indexer_builds_bai_with_mapped_counts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("realigned.bam");
        let dst = dir.path().join("realigned.bam.bai");
        write_bam_from_sam(
            &src,
            "@HD\tVN:1.6\tSO:coordinate\n\
             @SQ\tSN:chr1\tLN:2000\n\
             @SQ\tSN:chr2\tLN:500\n\
             a\t0\tchr1\t20\t60\t4M\t*\t0\t0\tACGT\t*\n\
             b\t0\tchr1\t900\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
             c\t0\tchr2\t5\t60\t4M\t*\t0\t0\tACGT\t*\n\
             u\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n",
        );

        NoodlesIndexer.index_alignments(&src, &dst).unwrap();

        let index = bai::read(&dst).unwrap();
        let mapped: Vec<u64> = index
            .reference_sequences()
            .iter()
            .map(|r| r.metadata().map_or(0, |m| m.mapped_record_count()))
            .collect();
        assert_eq!(mapped, vec![2, 1]);
        assert_eq!(index.unplaced_unmapped_record_count(), Some(1));
    }

    #[test]
    fn test_unsorted_bam_is_not_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("unsorted.bam");
        write_bam_from_sam(
            &src,
            "@HD\tVN:1.6\tSO:unsorted\n@SQ\tSN:chr1\tLN:100\n\
             a\t0\tchr1\t20\t60\t4M\t*\t0\t0\tACGT\t*\n",
        );

        let err = NoodlesIndexer
            .index_alignments(&src, &dir.path().join("unsorted.bam.bai"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
