use std::io::BufReader;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::core::chromosome::DeclaredSequence;
use crate::utils::validation::{check_contig_limit, is_valid_sequence_name};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("resource error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource error: cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: invalid format: {0}")]
    InvalidFormat(String),

    #[error("resource error: cannot decode input: {0}")]
    Noodles(String),

    #[error("configuration error: unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("configuration error: too many contigs: {0} exceeds maximum allowed (100000)")]
    TooManyContigs(usize),
}

/// Alignment container formats we can read a header from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    Sam,
    Bam,
    Cram,
}

impl AlignmentFormat {
    /// Detect the format from the file extension; no extension means SAM.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnsupportedFormat` for unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("sam") | None => Ok(Self::Sam),
            Some("bam") => Ok(Self::Bam),
            Some("cram") => Ok(Self::Cram),
            Some(ext) => Err(ParseError::UnsupportedFormat(ext.to_string())),
        }
    }
}

pub(crate) fn open_file(path: &Path) -> Result<std::fs::File, ParseError> {
    std::fs::File::open(path).map_err(|source| ParseError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// Read the header of a SAM/BAM/CRAM file.
///
/// # Errors
///
/// Returns `ParseError::Open` if the file cannot be opened, `ParseError::Noodles`
/// if the header cannot be decoded, or `ParseError::UnsupportedFormat` for
/// unknown extensions.
pub fn read_header(path: &Path) -> Result<noodles::sam::Header, ParseError> {
    use noodles::{bam, cram, sam};

    let file = open_file(path)?;
    let header = match AlignmentFormat::from_path(path)? {
        AlignmentFormat::Sam => sam::io::Reader::new(BufReader::new(file)).read_header(),
        AlignmentFormat::Bam => bam::io::Reader::new(file).read_header(),
        AlignmentFormat::Cram => {
            let mut reader = cram::io::Reader::new(file);
            reader
                .read_file_definition()
                .map_err(|e| ParseError::Noodles(e.to_string()))?;
            reader.read_file_header()
        }
    }
    .map_err(|e| ParseError::Noodles(e.to_string()))?;

    Ok(header)
}

/// Parse the `@SQ` lines of a SAM/BAM/CRAM file, in header order.
///
/// # Errors
///
/// See [`read_header`]; additionally `ParseError::InvalidFormat` if the header
/// declares no sequences or an unusable sequence name.
pub fn parse_file(path: &Path) -> Result<Vec<DeclaredSequence>, ParseError> {
    let header = read_header(path)?;
    let sequences = header_to_sequences(&header)?;
    debug!(
        path = %path.display(),
        sequences = sequences.len(),
        "Read alignment header"
    );
    Ok(sequences)
}

/// Convert a noodles header to declared sequences
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for an empty dictionary or a bad name,
/// or `ParseError::TooManyContigs` if the limit is exceeded.
pub fn header_to_sequences(
    header: &noodles::sam::Header,
) -> Result<Vec<DeclaredSequence>, ParseError> {
    let mut sequences = Vec::new();

    for (name, map) in header.reference_sequences() {
        // Check contig limit for DOS protection
        if check_contig_limit(sequences.len()).is_some() {
            return Err(ParseError::TooManyContigs(sequences.len()));
        }

        let name = name.to_string();
        if !is_valid_sequence_name(&name) {
            return Err(ParseError::InvalidFormat(format!(
                "Invalid reference sequence name '{name}'"
            )));
        }

        let length = map.length().get() as u64;
        sequences.push(DeclaredSequence::new(name, length));
    }

    if sequences.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No @SQ lines found in header".to_string(),
        ));
    }

    Ok(sequences)
}
