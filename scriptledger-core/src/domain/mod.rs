//! Core domain entities
//!
//! Plain data structures for scripts, ledger rows and run results - no I/O.

mod ledger;
mod script;
mod summary;
pub mod result;

pub use ledger::{Checkpoint, LedgerRecord, NewLedgerRecord};
pub use script::{sort_by_introduction, ChangedPath, FileStatus, RevisionId, ScriptChange};
pub use summary::{RunPhase, RunSummary};
