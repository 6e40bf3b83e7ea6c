//! Reporter port - operator-facing progress output
//!
//! The core never prints. It hands structured events to a `Reporter`, and
//! the CLI decides how they look.

use std::fmt;

use crate::domain::{LedgerRecord, RevisionId, RunSummary};

/// Lifecycle of a single script within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    Executing,
    Succeeded,
    Failed,
    Skipped,
    /// Would run; reported by dry runs
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Something worth telling the operator about
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    FreshEnvironment,
    Checkpoint(&'a RevisionId),
    CurrentRevision(&'a RevisionId),
    MissedScriptsFound(usize),
    TamperedScripts {
        modified: &'a [String],
        deleted: &'a [String],
    },
    /// Rows written after the last checkpoint, i.e. by a run that never finished
    UnfinishedBatch(&'a [LedgerRecord]),
    UnfinishedBatchResumable,
    PendingScripts(usize),
    NoPendingScripts,
    /// Success row or commit failed after the script ran
    EffectsUnconfirmed(&'a str),
    /// The failure row for a failed script could not be written
    FailureNotRecorded(&'a str),
    Completed,
}

impl RunEvent<'_> {
    pub fn severity(&self) -> Severity {
        match self {
            RunEvent::TamperedScripts { .. }
            | RunEvent::EffectsUnconfirmed(_)
            | RunEvent::FailureNotRecorded(_) => Severity::Error,
            RunEvent::UnfinishedBatch(_) => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for RunEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::FreshEnvironment => {
                write!(f, "No previous migration found - this is a fresh migration")
            }
            RunEvent::Checkpoint(rev) => write!(f, "Last successful migration at revision: {}", rev),
            RunEvent::CurrentRevision(rev) => write!(f, "Current revision: {}", rev),
            RunEvent::MissedScriptsFound(n) => write!(f, "Found {} missed scripts to process", n),
            RunEvent::TamperedScripts { modified, deleted } => {
                let mut first = true;
                if !modified.is_empty() {
                    write!(f, "Previously executed scripts have been MODIFIED:")?;
                    for path in modified.iter() {
                        write!(f, "\n  - {}", path)?;
                    }
                    first = false;
                }
                if !deleted.is_empty() {
                    if !first {
                        writeln!(f)?;
                    }
                    write!(f, "Previously executed scripts have been DELETED:")?;
                    for path in deleted.iter() {
                        write!(f, "\n  - {}", path)?;
                    }
                }
                Ok(())
            }
            RunEvent::UnfinishedBatch(records) => {
                write!(
                    f,
                    "Detected {} scripts recorded after the last checkpoint (an interrupted batch, or missed scripts applied since):",
                    records.len()
                )?;
                for rec in records.iter() {
                    let status = if rec.completed { "completed" } else { "FAILED" };
                    write!(f, "\n  - {} ({})", rec.script_name, status)?;
                }
                Ok(())
            }
            RunEvent::UnfinishedBatchResumable => {
                write!(f, "All scripts recorded after the last checkpoint completed, continuing...")
            }
            RunEvent::PendingScripts(n) => write!(f, "Found {} new scripts to execute", n),
            RunEvent::NoPendingScripts => write!(f, "No new scripts to execute"),
            RunEvent::EffectsUnconfirmed(name) => write!(
                f,
                "Script {} ran but its execution record was not written; treat its effects as unconfirmed and check the database before re-running",
                name
            ),
            RunEvent::FailureNotRecorded(name) => write!(
                f,
                "Script {} failed and the failure could not be recorded in the ledger; the next run will not know about it",
                name
            ),
            RunEvent::Completed => write!(f, "Migration completed successfully!"),
        }
    }
}

/// Injected reporting interface
pub trait Reporter {
    fn info(&self, msg: &str);

    fn warn(&self, msg: &str);

    fn error(&self, msg: &str);

    fn script_status(&self, name: &str, status: ScriptStatus);

    fn summary(&self, summary: &RunSummary);

    /// Render a structured event. Defaults to its `Display` text at its severity.
    fn event(&self, event: RunEvent<'_>) {
        let msg = event.to_string();
        match event.severity() {
            Severity::Info => self.info(&msg),
            Severity::Warn => self.warn(&msg),
            Severity::Error => self.error(&msg),
        }
    }
}
