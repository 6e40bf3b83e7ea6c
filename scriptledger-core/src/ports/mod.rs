//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod database;
mod reporter;
mod scripts;
mod vcs;

pub use database::{Database, DbError, DbResult, Dialect, Executor, SqlRow, SqlValue, Transaction};
pub use reporter::{Reporter, RunEvent, ScriptStatus, Severity};
pub use scripts::ScriptSource;
pub use vcs::VersionControl;
