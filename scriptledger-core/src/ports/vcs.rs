//! Version control port - read-only history queries

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::{ChangedPath, RevisionId};

/// Read-only view of the version-control history the scripts live in
pub trait VersionControl {
    /// Whether the working directory is inside a repository
    fn is_repository(&self) -> bool;

    /// Revision currently checked out
    fn current_revision(&self) -> Result<RevisionId>;

    /// Paths changed between two revisions. `None` diffs against the empty
    /// tree, so every tracked file is reported as added.
    fn changed_paths(&self, from: Option<&RevisionId>, to: &RevisionId) -> Result<Vec<ChangedPath>>;

    /// Time of the earliest commit that added `path` (repository-relative).
    /// Falls back to the current time when the path has no history.
    fn first_introduced_at(&self, path: &str) -> DateTime<Utc>;

    /// Absolute repository root
    fn toplevel(&self) -> Result<PathBuf>;

    /// Working directory relative to the repository root, with a trailing
    /// slash, empty at the root
    fn prefix(&self) -> Result<String>;
}
