//! Tab-delimited reference base counts.
//!
//! One row per contig: `file\tcontig\tknownCount\ttotalCount`. This is the
//! output of `binflow count-bases` and may be passed back to `configure` to
//! skip rescanning a large reference.

use std::fmt::Write as _;
use std::path::Path;

use crate::core::chromosome::ContigBaseCounts;
use crate::parsing::sam::{open_file, ParseError};
use crate::utils::validation::check_contig_limit;

/// Read a base counts table from a file
///
/// # Errors
///
/// Returns `ParseError::Open` if the file cannot be read, or
/// `ParseError::InvalidFormat` for malformed rows.
pub fn parse_counts_file(path: &Path) -> Result<Vec<ContigBaseCounts>, ParseError> {
    use std::io::Read;

    let mut text = String::new();
    open_file(path)?.read_to_string(&mut text)?;
    parse_counts_text(&text)
}

/// Parse base counts rows
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if a row does not have exactly four
/// fields, a count is not a number, the known count exceeds the total, or no
/// rows are present; `ParseError::TooManyContigs` if the limit is exceeded.
pub fn parse_counts_text(text: &str) -> Result<Vec<ContigBaseCounts>, ParseError> {
    let mut contigs = Vec::new();

    for (i, line) in text.lines().enumerate() {
        // Line numbers in errors are 1-based for user friendliness
        let line_num = i + 1;
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has {} fields, expected 4",
                fields.len()
            )));
        }

        let parse_count = |field: &str, what: &str| {
            field.parse::<u64>().map_err(|_| {
                ParseError::InvalidFormat(format!(
                    "Invalid {what} count on line {line_num}: '{field}'"
                ))
            })
        };
        let known = parse_count(fields[2], "known")?;
        let total = parse_count(fields[3], "total")?;
        if known > total {
            return Err(ParseError::InvalidFormat(format!(
                "Known count {known} exceeds total {total} on line {line_num}"
            )));
        }

        if check_contig_limit(contigs.len()).is_some() {
            return Err(ParseError::TooManyContigs(contigs.len()));
        }

        contigs.push(ContigBaseCounts {
            source: fields[0].to_string(),
            name: fields[1].to_string(),
            known,
            total,
        });
    }

    if contigs.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No contigs found in base counts".to_string(),
        ));
    }

    Ok(contigs)
}

/// Render base counts as tab-delimited rows
#[must_use]
pub fn format_counts(counts: &[ContigBaseCounts]) -> String {
    let mut out = String::new();
    for c in counts {
        let _ = writeln!(out, "{}\t{}\t{}\t{}", c.source, c.name, c.known, c.total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counts_text() {
        let text = "genome.fa\tchr1\t230481014\t248956422\ngenome.fa\tchrM\t16568\t16569\n";
        let counts = parse_counts_text(text).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].name, "chr1");
        assert_eq!(counts[0].known, 230_481_014);
        assert_eq!(counts[0].total, 248_956_422);
        assert_eq!(counts[1].source, "genome.fa");
    }

    #[test]
    fn test_format_then_parse() {
        let counts = vec![ContigBaseCounts {
            source: "ref.fa".to_string(),
            name: "chr1".to_string(),
            known: 8,
            total: 14,
        }];
        let text = format_counts(&counts);
        assert_eq!(text, "ref.fa\tchr1\t8\t14\n");
        assert_eq!(parse_counts_text(&text).unwrap(), counts);
    }

    #[test]
    fn test_rejects_short_rows() {
        assert!(parse_counts_text("ref.fa\tchr1\t8\n").is_err());
    }

    #[test]
    fn test_rejects_known_above_total() {
        let err = parse_counts_text("ref.fa\tchr1\t9\t8\n").unwrap_err();
        assert!(err.to_string().contains("exceeds total"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(parse_counts_text("# nothing\n").is_err());
    }
}
