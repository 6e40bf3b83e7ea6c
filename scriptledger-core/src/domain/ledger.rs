//! Execution ledger records

use chrono::NaiveDateTime;
use serde::Serialize;

use super::RevisionId;

/// One persisted execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub ordinal: i64,
    pub script_name: String,
    pub completed: bool,
    pub is_batch_terminator: bool,
    pub revision_id: Option<RevisionId>,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// A row about to be appended; the ledger assigns ordinal and timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerRecord {
    pub script_name: String,
    pub completed: bool,
    pub is_batch_terminator: bool,
    pub revision_id: RevisionId,
}

impl NewLedgerRecord {
    /// Row for a script whose batch succeeded
    pub fn success(script_name: impl Into<String>, revision_id: RevisionId, is_batch_terminator: bool) -> Self {
        Self {
            script_name: script_name.into(),
            completed: true,
            is_batch_terminator,
            revision_id,
        }
    }

    /// Row for a script whose batch failed. Never terminates a batch.
    pub fn failure(script_name: impl Into<String>, revision_id: RevisionId) -> Self {
        Self {
            script_name: script_name.into(),
            completed: false,
            is_batch_terminator: false,
            revision_id,
        }
    }
}

/// The newest batch-terminator row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub ordinal: i64,
    pub revision_id: Option<RevisionId>,
}
