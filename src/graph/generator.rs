use std::path::PathBuf;

use tracing::debug;

use crate::core::bins::{BinId, BinRegion};
use crate::core::config::WorkflowConfig;
use crate::core::layout::RunLayout;

/// One per-bin task of the build graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinTask {
    /// Chromosome name as declared in the alignment header
    pub chromosome: String,
    /// Chromosome label used in paths and on the task command line
    pub label: String,
    pub region: BinRegion,
    /// Every task but the first suppresses the shared VCF header
    pub skip_header: bool,
    /// Completion marker, relative to the run directory
    pub marker: PathBuf,
}

impl BinTask {
    #[must_use]
    pub fn bin(&self) -> BinId {
        self.region.bin
    }
}

/// The aggregate task that runs once every bin task is complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishTask {
    /// Completion marker, relative to the run directory
    pub marker: PathBuf,
    /// Indexes into [`BuildGraph::bins`]; always every bin
    pub depends_on: Vec<usize>,
}

/// Dependency graph over the tasks of a run.
///
/// Bin tasks are independent siblings in chromosome-then-bin order; the finish
/// task fans in from all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildGraph {
    pub bins: Vec<BinTask>,
    pub finish: FinishTask,
}

impl BuildGraph {
    /// Markers the finish task waits on, in graph order
    pub fn finish_dependencies(&self) -> impl Iterator<Item = &BinTask> {
        self.finish.depends_on.iter().map(|&i| &self.bins[i])
    }

    /// The single task that writes the shared header
    #[must_use]
    pub fn header_task(&self) -> Option<&BinTask> {
        self.bins.iter().find(|task| !task.skip_header)
    }
}

/// Build the task graph for a configuration.
///
/// Pure and deterministic: the same configuration always yields the same
/// graph, so regenerating it never changes which bin writes the header.
#[must_use]
pub fn generate(config: &WorkflowConfig) -> BuildGraph {
    let layout = RunLayout::relative();

    let bins: Vec<BinTask> = config
        .all_bins()
        .enumerate()
        .map(|(i, (chrom, region))| BinTask {
            chromosome: chrom.name.clone(),
            label: chrom.label.clone(),
            region,
            skip_header: i > 0,
            marker: layout.bin(&chrom.label, region.bin).marker(),
        })
        .collect();

    debug!(bins = bins.len(), "Generated build graph");

    let finish = FinishTask {
        marker: layout.workflow_marker(),
        depends_on: (0..bins.len()).collect(),
    };

    BuildGraph { bins, finish }
}
