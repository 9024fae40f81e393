//! Reference base counting over FASTA files using noodles.
//!
//! For each contig, counts the total number of sequence symbols and the
//! number of known bases (`ACGTacgt`). Ambiguity codes, gaps and any other
//! symbol count toward the total only.
//!
//! Supported extensions:
//! - `.fa`, `.fasta`, `.fna` (uncompressed)
//! - `.fa.gz`, `.fasta.gz`, `.fna.gz` (gzip compressed)
//! - `.fa.bgz`, `.fasta.bgz`, `.fna.bgz` (bgzip compressed)

use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::fasta;

use crate::core::chromosome::ContigBaseCounts;
use crate::parsing::sam::{open_file, ParseError};
use crate::utils::validation::check_contig_limit;

/// Check if the path has a FASTA extension
#[must_use]
pub fn is_fasta_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();

    // Check for gzipped FASTA
    if path_str.ends_with(".fa.gz")
        || path_str.ends_with(".fasta.gz")
        || path_str.ends_with(".fna.gz")
        || path_str.ends_with(".fa.bgz")
        || path_str.ends_with(".fasta.bgz")
        || path_str.ends_with(".fna.bgz")
    {
        return true;
    }

    // Check for uncompressed FASTA
    matches!(
        path.extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase)
            .as_deref(),
        Some("fa" | "fasta" | "fna")
    )
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Whether a sequence symbol is one of the four canonical nucleotides
#[inline]
#[must_use]
pub fn is_known_base(symbol: u8) -> bool {
    matches!(symbol, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't')
}

/// Count known and total bases for every contig of a FASTA file.
///
/// # Errors
///
/// Returns `ParseError::UnsupportedFormat` for a non-FASTA extension,
/// `ParseError::Open` if the file cannot be opened, `ParseError::Noodles`
/// if a record cannot be parsed, `ParseError::InvalidFormat` if no contigs are
/// found, or `ParseError::TooManyContigs` if the limit is exceeded.
pub fn count_bases(path: &Path) -> Result<Vec<ContigBaseCounts>, ParseError> {
    if !is_fasta_file(path) {
        return Err(ParseError::UnsupportedFormat(format!(
            "'{}' is not a FASTA file (.fa, .fasta or .fna, optionally .gz/.bgz)",
            path.display()
        )));
    }
    let file = open_file(path)?;
    let source = path.display().to_string();

    if is_gzipped(path) {
        let reader = BufReader::new(MultiGzDecoder::new(file));
        count_bases_from_reader(reader, &source)
    } else {
        count_bases_from_reader(BufReader::new(file), &source)
    }
}

/// Count bases from any buffered FASTA stream; `source` labels the output rows.
///
/// # Errors
///
/// See [`count_bases`].
pub fn count_bases_from_reader<R: BufRead>(
    reader: R,
    source: &str,
) -> Result<Vec<ContigBaseCounts>, ParseError> {
    let mut fasta_reader = fasta::io::Reader::new(reader);
    let mut contigs = Vec::new();

    for result in fasta_reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        // Check contig limit for DOS protection
        if check_contig_limit(contigs.len()).is_some() {
            return Err(ParseError::TooManyContigs(contigs.len()));
        }

        let name = String::from_utf8_lossy(record.name()).to_string();
        let mut known = 0u64;
        let mut total = 0u64;
        for &symbol in record.sequence().as_ref() {
            // Windows line endings can survive line splitting
            if symbol == b'\r' {
                continue;
            }
            total += 1;
            if is_known_base(symbol) {
                known += 1;
            }
        }

        contigs.push(ContigBaseCounts {
            source: source.to_string(),
            name,
            known,
            total,
        });
    }

    if contigs.is_empty() {
        return Err(ParseError::InvalidFormat(format!(
            "No sequences found in FASTA file '{source}'"
        )));
    }

    Ok(contigs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_is_fasta_file() {
        assert!(is_fasta_file(Path::new("test.fa")));
        assert!(is_fasta_file(Path::new("test.fasta")));
        assert!(is_fasta_file(Path::new("test.fna.bgz")));
        assert!(is_fasta_file(Path::new("/path/to/Reference.FA")));

        assert!(!is_fasta_file(Path::new("test.bam")));
        assert!(!is_fasta_file(Path::new("test.fai")));
    }

    #[test]
    fn test_known_base_symbols() {
        for symbol in b"ACGTacgt" {
            assert!(is_known_base(*symbol));
        }
        for symbol in b"NnRYKM-.*" {
            assert!(!is_known_base(*symbol));
        }
    }

    #[test]
    fn test_count_bases() {
        let fasta = b">chr1 description\nACGTNNNN\nacgtRY\n>chr2\nGGGG\n>chr3\nNNNN\n";

        let counts = count_bases_from_reader(&fasta[..], "genome.fa").unwrap();
        assert_eq!(counts.len(), 3);

        assert_eq!(counts[0].name, "chr1");
        assert_eq!(counts[0].source, "genome.fa");
        assert_eq!(counts[0].known, 8);
        assert_eq!(counts[0].total, 14);

        assert_eq!(counts[1].name, "chr2");
        assert_eq!((counts[1].known, counts[1].total), (4, 4));

        assert_eq!((counts[2].known, counts[2].total), (0, 4));
    }

    #[test]
    fn test_count_bases_gzipped() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut temp = NamedTempFile::with_suffix(".fa.gz").unwrap();
        {
            let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
            encoder.write_all(b">chrM\nACGTN\n").unwrap();
            encoder.finish().unwrap();
        }

        let counts = count_bases(temp.path()).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!((counts[0].known, counts[0].total), (4, 5));
    }

    #[test]
    fn test_count_bases_empty() {
        let mut temp = NamedTempFile::with_suffix(".fa").unwrap();
        temp.write_all(b"").unwrap();
        temp.flush().unwrap();

        assert!(count_bases(temp.path()).is_err());
    }

    #[test]
    fn test_count_bases_rejects_other_formats() {
        let mut temp = NamedTempFile::with_suffix(".bam").unwrap();
        temp.write_all(b">chr1\nACGT\n").unwrap();
        temp.flush().unwrap();

        assert!(matches!(
            count_bases(temp.path()),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }
}
