//! Configuration management
//!
//! Optional `scriptledger.json` in the scripts directory:
//! ```json
//! { "ledgerTable": "sqlScriptExec", "scopeToScriptsDir": false }
//! ```
//! Environment variables override the file.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Name of the settings file looked up in the scripts directory
pub const SETTINGS_FILE: &str = "scriptledger.json";

/// Default ledger table name
pub const DEFAULT_LEDGER_TABLE: &str = "sqlScriptExec";

const TABLE_ENV: &str = "SCRIPTLEDGER_TABLE";
const SCOPE_ENV: &str = "SCRIPTLEDGER_SCOPE_TO_DIR";

/// Raw scriptledger.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger_table: Option<String>,
    #[serde(default)]
    scope_to_scripts_dir: bool,
}

/// Validated SQL identifier for the ledger table
///
/// The only value ever interpolated into ledger SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTable(String);

impl LedgerTable {
    pub fn parse(name: &str) -> Result<Self> {
        let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").map_err(|e| Error::config(e.to_string()))?;
        if !ident.is_match(name) {
            return Err(Error::config(format!("invalid ledger table name: '{}'", name)));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self(DEFAULT_LEDGER_TABLE.to_string())
    }
}

impl fmt::Display for LedgerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger and discovery settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub ledger_table: LedgerTable,
    /// Only discover scripts under the scripts directory
    pub scope_to_scripts_dir: bool,
}

impl Settings {
    /// Load settings from the scripts directory
    ///
    /// Overrides:
    /// 1. SCRIPTLEDGER_TABLE replaces `ledgerTable`
    /// 2. SCRIPTLEDGER_SCOPE_TO_DIR replaces `scopeToScriptsDir`
    pub fn load(scripts_dir: &Path) -> Result<Self> {
        let settings_path = scripts_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)?
        } else {
            SettingsFile::default()
        };

        Self::resolve(
            raw,
            std::env::var(TABLE_ENV).ok().as_deref(),
            std::env::var(SCOPE_ENV).ok().as_deref(),
        )
    }

    fn resolve(raw: SettingsFile, table_env: Option<&str>, scope_env: Option<&str>) -> Result<Self> {
        let ledger_table = match table_env.or(raw.ledger_table.as_deref()) {
            Some(name) => LedgerTable::parse(name)?,
            None => LedgerTable::default(),
        };

        let scope_to_scripts_dir = match scope_env {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.scope_to_scripts_dir,
        };

        Ok(Self {
            ledger_table,
            scope_to_scripts_dir,
        })
    }
}

/// Database connection arguments as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

/// Paths a run works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub scripts_dir: PathBuf,
    pub missed_scripts_file: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(scripts_dir: impl Into<PathBuf>, missed_scripts_file: Option<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            missed_scripts_file,
        }
    }

    /// Check that the scripts directory and the missed-scripts file exist
    pub fn validate(&self) -> Result<()> {
        if !self.scripts_dir.is_dir() {
            return Err(Error::ScriptsDirMissing(self.scripts_dir.clone()));
        }
        if let Some(path) = &self.missed_scripts_file {
            if !path.is_file() {
                return Err(Error::MissedScriptsFileMissing(path.clone()));
            }
        }
        Ok(())
    }
}
