//! Missed-scripts list
//!
//! Plain text, one script name per line. Blank lines and `#` comments are
//! ignored; order is preserved.

use std::fs;
use std::path::Path;

use crate::domain::result::{Error, Result};

/// Parse the list text into script names
pub fn parse_missed_scripts(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read and parse a missed-scripts file
pub fn read_missed_scripts(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| Error::MissedScriptsUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_missed_scripts(&content))
}
