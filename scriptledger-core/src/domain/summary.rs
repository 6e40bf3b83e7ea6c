//! Run summary and run phases

use serde::Serialize;

/// Counts reported at the end of every run, successful or not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Scripts discovered in the diff range
    pub discovered: usize,
    pub succeeded: usize,
    /// 0 or 1: a run stops at its first failure
    pub failed: usize,
    /// Discovered scripts that were already completed
    pub skipped: usize,
    /// Scripts applied from the missed-scripts list
    pub missed_applied: usize,
    /// Missed-scripts entries that were already completed
    pub missed_skipped: usize,
}

/// Where an orchestrator run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "phase", content = "index")]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    Discovering,
    /// Index into the pending set of the script being executed
    Executing(usize),
    Failed,
    Completed,
}
