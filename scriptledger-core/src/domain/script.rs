//! Script and revision domain models

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full version-control revision id (e.g. a git commit hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a path between two revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

impl FileStatus {
    /// Parse a git `--name-status` letter. Type changes count as
    /// modifications; anything else (unmerged, unknown) is not tracked.
    pub fn from_git_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' => Some(Self::Added),
            'M' | 'T' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// A path reported as changed between two revisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    /// Repository-relative path, forward slashes
    pub path: String,
    pub status: FileStatus,
}

impl ChangedPath {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }

    /// Base file name of the path
    pub fn file_name(&self) -> &str {
        base_name(&self.path)
    }

    pub fn is_sql(&self) -> bool {
        self.path.ends_with(".sql")
    }
}

/// One script discovered in history. Recomputed every run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptChange {
    pub name: String,
    pub path: String,
    pub introduced_at: DateTime<Utc>,
}

impl ScriptChange {
    pub fn new(path: impl Into<String>, introduced_at: DateTime<Utc>) -> Self {
        let path = path.into();
        Self {
            name: base_name(&path).to_string(),
            path,
            introduced_at,
        }
    }
}

/// Order scripts by first-introduction time, oldest first. Scripts added in
/// the same commit share a timestamp and fall back to lexical path order.
pub fn sort_by_introduction(scripts: &mut [ScriptChange]) {
    scripts.sort_by(|a, b| {
        a.introduced_at
            .cmp(&b.introduced_at)
            .then_with(|| a.path.cmp(&b.path))
    });
}

fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_script_change_uses_base_name() {
        let script = ScriptChange::new("db/changes/001_users.sql", at(0));
        assert_eq!(script.name, "001_users.sql");
        assert_eq!(script.path, "db/changes/001_users.sql");
    }

    #[test]
    fn test_sort_by_introduction_orders_by_time_then_path() {
        let mut scripts = vec![
            ScriptChange::new("db/c.sql", at(200)),
            ScriptChange::new("db/b.sql", at(100)),
            ScriptChange::new("db/z.sql", at(50)),
            ScriptChange::new("db/a.sql", at(100)),
        ];
        sort_by_introduction(&mut scripts);
        let names: Vec<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["z.sql", "a.sql", "b.sql", "c.sql"]);
    }

    #[test]
    fn test_file_status_from_git_code() {
        assert_eq!(FileStatus::from_git_code("A"), Some(FileStatus::Added));
        assert_eq!(FileStatus::from_git_code("M"), Some(FileStatus::Modified));
        assert_eq!(FileStatus::from_git_code("T"), Some(FileStatus::Modified));
        assert_eq!(FileStatus::from_git_code("D"), Some(FileStatus::Deleted));
        assert_eq!(FileStatus::from_git_code("U"), None);
        assert_eq!(FileStatus::from_git_code(""), None);
    }

    #[test]
    fn test_changed_path_helpers() {
        let changed = ChangedPath::new("migrations/007_tags.sql", FileStatus::Modified);
        assert_eq!(changed.file_name(), "007_tags.sql");
        assert!(changed.is_sql());
        assert!(!ChangedPath::new("README.md", FileStatus::Added).is_sql());
    }
}
