//! Render a [`BuildGraph`] as a GNU make file.
//!
//! Each bin task is a rule whose target is its completion marker and whose
//! only prerequisite is the run configuration. make considers a bin done when
//! the marker exists and is newer than the configuration, so `make -j N` after
//! a partial failure only re-runs bins without a fresh marker. The task itself
//! writes the marker, after its outputs are complete.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::layout::CONFIG_FILE;
use crate::graph::generator::BuildGraph;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("resource error: failed to write build graph '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render the make file for `graph`.
///
/// `runner` is the `binflow` executable the rules invoke.
#[must_use]
pub fn render(graph: &BuildGraph, runner: &Path) -> String {
    let mut out = String::new();
    let runner = make_escape(&shell_quote(&runner.display().to_string()));

    // Writing to a String cannot fail
    let _ = writeln!(out, "# Generated by binflow configure. Do not edit.");
    let _ = writeln!(out, "SHELL := /bin/sh");
    let _ = writeln!(out, "BINFLOW := {runner}");
    let _ = writeln!(out, "CONFIG := {CONFIG_FILE}");
    let _ = writeln!(out);
    let _ = writeln!(out, ".PHONY: all");
    let _ = writeln!(out, "all: {}", graph.finish.marker.display());
    let _ = writeln!(out);

    let _ = write!(out, "{}:", graph.finish.marker.display());
    for task in graph.finish_dependencies() {
        let _ = write!(out, " \\\n\t{}", task.marker.display());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "\t$(BINFLOW) consolidate --config $(CONFIG)");
    let _ = writeln!(out, "\ttouch $@");

    for task in &graph.bins {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}: $(CONFIG)", task.marker.display());
        let _ = write!(
            out,
            "\t$(BINFLOW) call-bin --config $(CONFIG) --chrom {} --bin {}",
            task.label,
            task.bin()
        );
        if task.skip_header {
            let _ = write!(out, " --skip-header");
        }
        let _ = writeln!(out);
    }

    out
}

/// Write the rendered make file atomically
///
/// # Errors
///
/// Returns `GraphError::Write` on I/O failure.
pub fn write(graph: &BuildGraph, runner: &Path, path: &Path) -> Result<(), GraphError> {
    let write_error = |source| GraphError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(render(graph, runner).as_bytes())
        .map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

/// Quote a word for `/bin/sh`
fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Escape `$` so make passes it through to the shell
fn make_escape(text: &str) -> String {
    text.replace('$', "$$")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::tests::sample_config;
    use crate::graph::generator::generate;

    const EXPECTED: &str = "\
# Generated by binflow configure. Do not edit.
SHELL := /bin/sh
BINFLOW := /usr/local/bin/binflow
CONFIG := config.toml

.PHONY: all
all: workflow.complete

workflow.complete: \\
\tchromosomes/chr1/bins/0000/bin.complete \\
\tchromosomes/chr1/bins/0001/bin.complete \\
\tchromosomes/chr1/bins/0002/bin.complete \\
\tchromosomes/chr2/bins/0000/bin.complete
\t$(BINFLOW) consolidate --config $(CONFIG)
\ttouch $@

chromosomes/chr1/bins/0000/bin.complete: $(CONFIG)
\t$(BINFLOW) call-bin --config $(CONFIG) --chrom chr1 --bin 0000

chromosomes/chr1/bins/0001/bin.complete: $(CONFIG)
\t$(BINFLOW) call-bin --config $(CONFIG) --chrom chr1 --bin 0001 --skip-header

chromosomes/chr1/bins/0002/bin.complete: $(CONFIG)
\t$(BINFLOW) call-bin --config $(CONFIG) --chrom chr1 --bin 0002 --skip-header

chromosomes/chr2/bins/0000/bin.complete: $(CONFIG)
\t$(BINFLOW) call-bin --config $(CONFIG) --chrom chr2 --bin 0000 --skip-header
";

    #[test]
    fn test_render_two_chromosomes() {
        let config = sample_config(
            Path::new("/runs/a"),
            &[("chr1", 2_500_000), ("chr2", 500_000)],
            1_000_000,
        );
        let text = render(&generate(&config), Path::new("/usr/local/bin/binflow"));
        assert_eq!(text, EXPECTED);
    }

    #[test]
    fn test_render_is_byte_identical_across_runs() {
        let config = sample_config(
            Path::new("/runs/a"),
            &[("chr1", 123_456), ("chrM", 16_569)],
            10_000,
        );
        let runner = Path::new("/opt/binflow");
        assert_eq!(
            render(&generate(&config), runner),
            render(&generate(&config), runner)
        );
    }

    #[test]
    fn test_write_makefile() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path(), &[("chr1", 100)], 50);
        let path = dir.path().join("Makefile");
        write(&generate(&config), Path::new("binflow"), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("--chrom chr1 --bin 0001 --skip-header"));
    }

    #[test]
    fn test_runner_quoting() {
        assert_eq!(shell_quote("/usr/bin/binflow"), "/usr/bin/binflow");
        assert_eq!(shell_quote("/opt/my tools/binflow"), "'/opt/my tools/binflow'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(make_escape("'$HOME/binflow'"), "'$$HOME/binflow'");
    }
}
