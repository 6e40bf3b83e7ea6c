//! Filesystem script source

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::ports::ScriptSource;

/// Reads scripts from the scripts directory
#[derive(Debug, Clone)]
pub struct FsScriptSource {
    scripts_dir: PathBuf,
}

impl FsScriptSource {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }
}

impl ScriptSource for FsScriptSource {
    fn read(&self, name: &str, fallback: Option<&Path>) -> io::Result<String> {
        match fs::read_to_string(self.scripts_dir.join(name)) {
            Ok(content) => Ok(content),
            Err(e) => match fallback {
                Some(path) => fs::read_to_string(path),
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_by_name_then_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let scripts = temp_dir.path().join("scripts");
        let nested = temp_dir.path().join("elsewhere");
        fs::create_dir_all(&scripts).unwrap();
        fs::create_dir_all(&nested).unwrap();
        fs::write(scripts.join("a.sql"), "SELECT 1;").unwrap();
        fs::write(nested.join("b.sql"), "SELECT 2;").unwrap();

        let source = FsScriptSource::new(&scripts);
        assert_eq!(source.read("a.sql", None).unwrap(), "SELECT 1;");
        assert_eq!(source.read("b.sql", Some(&nested.join("b.sql"))).unwrap(), "SELECT 2;");
        assert_eq!(
            source.read("b.sql", None).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
