//! Consistency checks run before any script is executed
//!
//! Pure decision logic over data the orchestrator has already fetched.
//! Each check either passes or returns the error that aborts the run.

use std::collections::HashSet;
use std::path::Path;

use crate::domain::result::{Error, Result};
use crate::domain::{ChangedPath, FileStatus, LedgerRecord};
use crate::ports::{Reporter, RunEvent, VersionControl};

/// Validates the environment and ledger state before a run
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsistencyValidator;

impl ConsistencyValidator {
    pub fn new() -> Self {
        Self
    }

    /// The scripts directory must live inside a repository
    pub fn check_repository(&self, vcs: &dyn VersionControl, scripts_dir: &Path) -> Result<()> {
        if !vcs.is_repository() {
            return Err(Error::NotAVersionControlledDirectory(scripts_dir.to_path_buf()));
        }
        Ok(())
    }

    /// Reject edits or deletions of scripts that already ran
    ///
    /// A changed path counts as executed when either its full path or its
    /// base name is among the completed names.
    pub fn check_tampering(
        &self,
        changes: &[ChangedPath],
        completed: &HashSet<String>,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        let mut modified = Vec::new();
        let mut deleted = Vec::new();

        for change in changes {
            if !completed.contains(&change.path) && !completed.contains(change.file_name()) {
                continue;
            }
            match change.status {
                FileStatus::Modified => modified.push(change.path.clone()),
                FileStatus::Deleted => deleted.push(change.path.clone()),
                FileStatus::Added => {}
            }
        }

        if modified.is_empty() && deleted.is_empty() {
            return Ok(());
        }

        modified.sort();
        deleted.sort();
        reporter.event(RunEvent::TamperedScripts {
            modified: &modified,
            deleted: &deleted,
        });

        Err(Error::TamperedHistory { modified, deleted })
    }

    /// Decide whether rows left by an unfinished batch allow this run to go on
    ///
    /// Any failed row stops the run until an operator resolves it; a batch
    /// that only lacks its terminator is resumed.
    pub fn check_unfinished_batch(&self, records: &[LedgerRecord], reporter: &dyn Reporter) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        reporter.event(RunEvent::UnfinishedBatch(records));

        if let Some(failed) = records.iter().find(|r| !r.completed) {
            return Err(Error::UnresolvedFailedBatch {
                script_name: failed.script_name.clone(),
            });
        }

        reporter.event(RunEvent::UnfinishedBatchResumable);
        Ok(())
    }
}
