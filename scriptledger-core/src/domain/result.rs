//! Result and error types for the core library

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ports::DbError;

/// Core library error type
///
/// Every variant is fatal for the run that produced it. The only condition
/// the core recovers from locally is a failed first-commit timestamp lookup,
/// which never surfaces here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("scripts directory does not exist: {}", .0.display())]
    ScriptsDirMissing(PathBuf),

    #[error("missed scripts file does not exist: {}", .0.display())]
    MissedScriptsFileMissing(PathBuf),

    #[error("scripts directory is not within a git repository: {}", .0.display())]
    NotAVersionControlledDirectory(PathBuf),

    #[error("version control unavailable: {0}")]
    VcsUnavailable(String),

    #[error("database connection failed: {0}")]
    Connectivity(#[source] DbError),

    #[error("execution ledger error: {0}")]
    Schema(#[source] DbError),

    #[error(
        "detected {} modified and {} deleted scripts that were previously executed - migration aborted",
        .modified.len(),
        .deleted.len()
    )]
    TamperedHistory {
        modified: Vec<String>,
        deleted: Vec<String>,
    },

    #[error("previous migration batch has failed script: {script_name} - manual intervention required")]
    UnresolvedFailedBatch { script_name: String },

    #[error("script {name} failed: {cause}")]
    ScriptExecutionFailed { name: String, cause: String },

    #[error("failed to record execution of {name}, {effects}: {cause}")]
    LedgerWriteFailed {
        name: String,
        effects: ScriptEffects,
        cause: String,
    },

    #[error("failed to read script {name}: {source}")]
    ScriptUnreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read missed scripts file {}: {source}", .path.display())]
    MissedScriptsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// State of a script's effects when its ledger row could not be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEffects {
    /// The script ran; the success row or the commit failed
    Unconfirmed,
    /// The script failed and was rolled back; only its failure row is missing
    RolledBack,
}

impl fmt::Display for ScriptEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptEffects::Unconfirmed => write!(f, "its effects are unconfirmed"),
            ScriptEffects::RolledBack => write!(f, "the script failed and was rolled back"),
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a version control error
    pub fn vcs(msg: impl Into<String>) -> Self {
        Self::VcsUnavailable(msg.into())
    }

    /// Name of the script this error is about, if any
    pub fn script_name(&self) -> Option<&str> {
        match self {
            Self::UnresolvedFailedBatch { script_name } => Some(script_name),
            Self::ScriptExecutionFailed { name, .. }
            | Self::LedgerWriteFailed { name, .. }
            | Self::ScriptUnreadable { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
