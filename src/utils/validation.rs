//! Centralized validation and helper functions.

/// Maximum number of contigs allowed in a single file (DOS protection)
pub const MAX_CONTIGS: usize = 100_000;

/// Check if adding another contig would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new contig.
/// Returns an error message if adding would exceed the limit, None if safe to add.
///
/// # Example
/// ```ignore
/// if check_contig_limit(contigs.len()).is_some() {
///     return Err(...);
/// }
/// contigs.push(new_contig); // Safe to add
/// ```
#[must_use]
pub fn check_contig_limit(count: usize) -> Option<String> {
    if count >= MAX_CONTIGS {
        Some(format!(
            "Too many contigs: adding another would exceed maximum of {MAX_CONTIGS}"
        ))
    } else {
        None
    }
}

/// Derive a directory and make-safe label from a sequence name.
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`. A name made only of
/// dots would escape its directory, so leading dots are replaced as well.
///
/// # Examples
///
/// ```
/// use binflow::utils::validation::sanitize_label;
///
/// assert_eq!(sanitize_label("chr1"), "chr1");
/// assert_eq!(sanitize_label("chrUn_KI270302v1"), "chrUn_KI270302v1");
/// assert_eq!(sanitize_label("HLA-A*01:01"), "HLA-A_01_01");
/// assert_eq!(sanitize_label(".."), "__");
/// ```
#[must_use]
pub fn sanitize_label(name: &str) -> String {
    let mut leading = true;
    name.chars()
        .map(|c| {
            let keep = c.is_ascii_alphanumeric() || c == '-' || c == '_' || (c == '.' && !leading);
            leading = leading && c == '.';
            if keep {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Check that a sequence name is usable as a SAM reference name.
///
/// Names may not be empty, may not contain whitespace, and may not start
/// with `*` or `=`.
#[must_use]
pub fn is_valid_sequence_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('*')
        && !name.starts_with('=')
        && !name.chars().any(char::is_whitespace)
}
