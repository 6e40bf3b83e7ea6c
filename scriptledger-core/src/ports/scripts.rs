//! Script source port - where script text comes from

use std::io;
use std::path::Path;

/// Reads script content
pub trait ScriptSource {
    /// Read the script called `name`. When it cannot be found under its
    /// name, `fallback` (if given) is tried instead.
    fn read(&self, name: &str, fallback: Option<&Path>) -> io::Result<String>;
}
