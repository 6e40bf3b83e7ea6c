//! Migration service - applies new change scripts exactly once
//!
//! Scripts are discovered from version-control history between the last
//! checkpoint and the current revision, ordered by the commit that first
//! added them, and executed one transaction each. Every attempt leaves a
//! row in the execution ledger; the last script of a successful batch
//! becomes the next checkpoint.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{RunConfig, Settings};
use crate::domain::result::{Error, Result, ScriptEffects};
use crate::domain::{
    sort_by_introduction, ChangedPath, FileStatus, NewLedgerRecord, RevisionId, RunPhase, RunSummary,
    ScriptChange,
};
use crate::ports::{Database, Reporter, RunEvent, ScriptSource, ScriptStatus, VersionControl};

use super::ledger::ExecutionLedger;
use super::missed::read_missed_scripts;
use super::validator::ConsistencyValidator;

/// What a run would execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub checkpoint: Option<RevisionId>,
    pub current: RevisionId,
    /// Every script changed in the range, in execution order
    pub discovered: Vec<ScriptChange>,
    /// Discovered scripts not yet completed
    pub pending: Vec<ScriptChange>,
}

/// Orchestrates a single migration run
pub struct MigrationService<'a> {
    db: &'a mut dyn Database,
    vcs: &'a dyn VersionControl,
    scripts: &'a dyn ScriptSource,
    reporter: &'a dyn Reporter,
    ledger: ExecutionLedger,
    validator: ConsistencyValidator,
    config: RunConfig,
    scope_to_scripts_dir: bool,
    phase: RunPhase,
}

impl<'a> MigrationService<'a> {
    pub fn new(
        db: &'a mut dyn Database,
        vcs: &'a dyn VersionControl,
        scripts: &'a dyn ScriptSource,
        reporter: &'a dyn Reporter,
        config: RunConfig,
        settings: &Settings,
    ) -> Self {
        let ledger = ExecutionLedger::new(settings.ledger_table.clone(), db.dialect());
        Self {
            db,
            vcs,
            scripts,
            reporter,
            ledger,
            validator: ConsistencyValidator::new(),
            config,
            scope_to_scripts_dir: settings.scope_to_scripts_dir,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run the migration
    ///
    /// This is the main entry point. It:
    /// 1. Validates the scripts directory and ensures the ledger exists
    /// 2. Reads the checkpoint and the current revision
    /// 3. Applies the missed-scripts list, if configured
    /// 4. Rejects tampered history and unresolved failed batches
    /// 5. Executes pending scripts in order, stopping at the first failure
    ///
    /// The summary reaches the reporter whether or not the run succeeds.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let outcome = self.run_steps(&mut summary);

        self.phase = match outcome {
            Ok(()) => RunPhase::Completed,
            Err(_) => RunPhase::Failed,
        };
        self.reporter.summary(&summary);

        outcome?;
        self.reporter.event(RunEvent::Completed);
        Ok(summary)
    }

    /// Compute what `run` would execute without executing anything
    ///
    /// The ledger table is still created when missing. The missed-scripts
    /// list is not consulted.
    pub fn plan(&mut self) -> Result<MigrationPlan> {
        let outcome = self.plan_steps();
        self.phase = match outcome {
            Ok(_) => RunPhase::Completed,
            Err(_) => RunPhase::Failed,
        };
        let plan = outcome?;

        for script in &plan.pending {
            self.reporter.script_status(&script.name, ScriptStatus::Pending);
        }
        Ok(plan)
    }

    fn plan_steps(&mut self) -> Result<MigrationPlan> {
        let (checkpoint, current) = self.prepare()?;
        self.discover(checkpoint, current)
    }

    fn run_steps(&mut self, summary: &mut RunSummary) -> Result<()> {
        let (checkpoint, current) = self.prepare()?;

        if let Some(path) = self.config.missed_scripts_file.clone() {
            self.execute_missed_scripts(&path, &current, summary)?;
        }

        let plan = self.discover(checkpoint, current)?;
        summary.discovered = plan.discovered.len();
        summary.skipped = plan.discovered.len() - plan.pending.len();

        if plan.pending.is_empty() {
            self.reporter.event(RunEvent::NoPendingScripts);
            return Ok(());
        }

        self.reporter.event(RunEvent::PendingScripts(plan.pending.len()));
        let root = self.vcs.toplevel()?;
        let last = plan.pending.len() - 1;

        for (i, script) in plan.pending.iter().enumerate() {
            self.phase = RunPhase::Executing(i);
            self.reporter.script_status(&script.name, ScriptStatus::Executing);

            let fallback = root.join(&script.path);
            match self.execute_script(&script.name, Some(&fallback), &plan.current, i == last) {
                Ok(()) => {
                    self.reporter.script_status(&script.name, ScriptStatus::Succeeded);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    self.reporter.script_status(&script.name, ScriptStatus::Failed);
                    summary.failed = 1;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Validate the environment, ensure the ledger, and read both ends of the range
    fn prepare(&mut self) -> Result<(Option<RevisionId>, RevisionId)> {
        self.phase = RunPhase::Validating;
        self.validator.check_repository(self.vcs, &self.config.scripts_dir)?;
        self.ledger.ensure_schema(&mut *self.db)?;

        let checkpoint = self.ledger.last_checkpoint_revision(&mut *self.db)?;
        match &checkpoint {
            Some(rev) => self.reporter.event(RunEvent::Checkpoint(rev)),
            None => self.reporter.event(RunEvent::FreshEnvironment),
        }

        let current = self.vcs.current_revision()?;
        self.reporter.event(RunEvent::CurrentRevision(&current));

        Ok((checkpoint, current))
    }

    /// Check ledger consistency and build the ordered pending set
    fn discover(&mut self, checkpoint: Option<RevisionId>, current: RevisionId) -> Result<MigrationPlan> {
        let completed = self.ledger.completed_script_names(&mut *self.db)?;
        let changes = self.vcs.changed_paths(checkpoint.as_ref(), &current)?;

        if checkpoint.is_some() {
            self.validator.check_tampering(&changes, &completed, self.reporter)?;
        }
        let unfinished = self.ledger.records_since_checkpoint(&mut *self.db)?;
        self.validator.check_unfinished_batch(&unfinished, self.reporter)?;

        self.phase = RunPhase::Discovering;
        let scope = if self.scope_to_scripts_dir {
            Some(self.vcs.prefix()?)
        } else {
            None
        };

        let mut discovered: Vec<ScriptChange> = changes
            .iter()
            .filter(|change| is_candidate(change, scope.as_deref()))
            .map(|change| ScriptChange::new(&change.path, self.vcs.first_introduced_at(&change.path)))
            .collect();
        sort_by_introduction(&mut discovered);

        let pending: Vec<ScriptChange> = discovered
            .iter()
            .filter(|script| !completed.contains(&script.name))
            .cloned()
            .collect();
        debug!(discovered = discovered.len(), pending = pending.len(), "discovery finished");

        Ok(MigrationPlan {
            checkpoint,
            current,
            discovered,
            pending,
        })
    }

    /// Apply the missed-scripts list ahead of discovery
    ///
    /// Listed scripts never terminate a batch, so they do not move the
    /// checkpoint. Names already completed, or repeated in the list, are
    /// skipped.
    fn execute_missed_scripts(&mut self, path: &Path, current: &RevisionId, summary: &mut RunSummary) -> Result<()> {
        let names = read_missed_scripts(path)?;
        if names.is_empty() {
            self.reporter.info("No missed scripts to process");
            return Ok(());
        }

        self.reporter.event(RunEvent::MissedScriptsFound(names.len()));
        let mut seen: HashSet<String> = self.ledger.completed_script_names(&mut *self.db)?;

        for name in &names {
            if !seen.insert(name.clone()) {
                self.reporter.script_status(name, ScriptStatus::Skipped);
                summary.missed_skipped += 1;
                continue;
            }

            self.reporter.script_status(name, ScriptStatus::Executing);
            match self.execute_script(name, None, current, false) {
                Ok(()) => {
                    self.reporter.script_status(name, ScriptStatus::Succeeded);
                    summary.missed_applied += 1;
                }
                Err(e) => {
                    self.reporter.script_status(name, ScriptStatus::Failed);
                    summary.failed = 1;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Execute one script in its own transaction and record the attempt
    fn execute_script(
        &mut self,
        name: &str,
        fallback: Option<&Path>,
        current: &RevisionId,
        is_batch_terminator: bool,
    ) -> Result<()> {
        let content = self
            .scripts
            .read(name, fallback)
            .map_err(|source| Error::ScriptUnreadable {
                name: name.to_string(),
                source,
            })?;

        let mut tx = self.db.begin().map_err(Error::Connectivity)?;

        if let Err(e) = tx.execute_batch(&content) {
            if let Err(rollback_err) = tx.rollback() {
                warn!(script = name, error = %rollback_err, "rollback after failed script failed");
            }

            let cause = e.to_string();
            let failure = NewLedgerRecord::failure(name, current.clone());
            if let Err(write_err) = self.ledger.append(&mut *self.db, &failure) {
                self.reporter.event(RunEvent::FailureNotRecorded(name));
                return Err(Error::LedgerWriteFailed {
                    name: name.to_string(),
                    effects: ScriptEffects::RolledBack,
                    cause: format!("{}; failure record not written: {}", cause, write_err),
                });
            }

            return Err(Error::ScriptExecutionFailed {
                name: name.to_string(),
                cause,
            });
        }

        let success = NewLedgerRecord::success(name, current.clone(), is_batch_terminator);
        if let Err(e) = self.ledger.append(&mut *tx, &success) {
            if let Err(rollback_err) = tx.rollback() {
                warn!(script = name, error = %rollback_err, "rollback after ledger write failure failed");
            }
            self.reporter.event(RunEvent::EffectsUnconfirmed(name));
            return Err(Error::LedgerWriteFailed {
                name: name.to_string(),
                effects: ScriptEffects::Unconfirmed,
                cause: e.to_string(),
            });
        }

        if let Err(e) = tx.commit() {
            self.reporter.event(RunEvent::EffectsUnconfirmed(name));
            return Err(Error::LedgerWriteFailed {
                name: name.to_string(),
                effects: ScriptEffects::Unconfirmed,
                cause: e.to_string(),
            });
        }

        Ok(())
    }
}

/// Added or modified `.sql` paths, optionally restricted to a directory prefix
fn is_candidate(change: &ChangedPath, scope: Option<&str>) -> bool {
    if !change.is_sql() || change.status == FileStatus::Deleted {
        return false;
    }
    match scope {
        Some(prefix) => change.path.starts_with(prefix),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_candidate_filters_status_and_extension() {
        assert!(is_candidate(&ChangedPath::new("db/a.sql", FileStatus::Added), None));
        assert!(is_candidate(&ChangedPath::new("db/a.sql", FileStatus::Modified), None));
        assert!(!is_candidate(&ChangedPath::new("db/a.sql", FileStatus::Deleted), None));
        assert!(!is_candidate(&ChangedPath::new("db/README.md", FileStatus::Added), None));
    }

    #[test]
    fn test_is_candidate_respects_scope() {
        let inside = ChangedPath::new("db/changes/a.sql", FileStatus::Added);
        let outside = ChangedPath::new("tools/seed.sql", FileStatus::Added);
        assert!(is_candidate(&inside, Some("db/changes/")));
        assert!(!is_candidate(&outside, Some("db/changes/")));
        assert!(is_candidate(&outside, Some("")));
    }
}
