//! Git command-line adapter for the VersionControl port
//!
//! Every query shells out to `git`. Nothing here writes to the repository.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{ChangedPath, FileStatus, RevisionId};
use crate::ports::VersionControl;

/// Git CLI bound to a working directory (the scripts directory)
#[derive(Debug, Clone)]
pub struct GitCli {
    work_dir: PathBuf,
}

impl GitCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Run git in `dir` and return raw stdout
    fn run_raw_in(dir: &Path, args: &[&str]) -> Result<String> {
        debug!(dir = %dir.display(), "git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::vcs(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        Ok(Self::run_raw_in(&self.work_dir, args)?.trim().to_string())
    }

    /// Hash of the empty tree, the "before" side of a first deployment
    fn empty_tree(&self) -> Result<String> {
        self.run(&["hash-object", "-t", "tree", "--stdin"])
    }
}

/// Parse NUL-separated `git diff --name-status -z` output
fn parse_name_status(output: &str) -> Vec<ChangedPath> {
    let mut fields = output.split('\0').filter(|f| !f.is_empty());
    let mut changes = Vec::new();

    while let (Some(code), Some(path)) = (fields.next(), fields.next()) {
        match FileStatus::from_git_code(code) {
            Some(status) => changes.push(ChangedPath::new(path, status)),
            None => debug!(code, path, "ignoring untracked diff status"),
        }
    }

    changes
}

impl VersionControl for GitCli {
    fn is_repository(&self) -> bool {
        self.run(&["rev-parse", "--git-dir"]).is_ok()
    }

    fn current_revision(&self) -> Result<RevisionId> {
        self.run(&["rev-parse", "HEAD"]).map(RevisionId::new)
    }

    fn changed_paths(&self, from: Option<&RevisionId>, to: &RevisionId) -> Result<Vec<ChangedPath>> {
        let from = match from {
            Some(rev) => rev.as_str().to_string(),
            None => self.empty_tree()?,
        };

        // Renames are reported as delete + add so a renamed script counts as deleted
        let output = Self::run_raw_in(
            &self.work_dir,
            &[
                "diff",
                "--name-status",
                "--no-renames",
                "--no-ext-diff",
                "-z",
                &from,
                to.as_str(),
            ],
        )?;

        Ok(parse_name_status(&output))
    }

    fn first_introduced_at(&self, path: &str) -> DateTime<Utc> {
        let lookup = self.toplevel().and_then(|root| {
            Self::run_raw_in(
                &root,
                &["log", "--follow", "--diff-filter=A", "--format=%ct", "--", path],
            )
        });

        // Newest first; the last line is the original add
        let parsed = lookup.map(|out| {
            out.lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .and_then(|line| line.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        });

        match parsed {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                warn!(path, "no commit adds this path, ordering it by current time");
                Utc::now()
            }
            Err(e) => {
                warn!(path, error = %e, "commit time lookup failed, ordering it by current time");
                Utc::now()
            }
        }
    }

    fn toplevel(&self) -> Result<PathBuf> {
        self.run(&["rev-parse", "--show-toplevel"]).map(PathBuf::from)
    }

    fn prefix(&self) -> Result<String> {
        self.run(&["rev-parse", "--show-prefix"])
    }
}
