//! scriptledger core - exactly-once SQL change scripts ordered by git history
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (ScriptChange, LedgerRecord, RunSummary, errors)
//! - **ports**: Trait definitions for external dependencies (Database, VersionControl, ScriptSource, Reporter)
//! - **services**: Business logic orchestration (ExecutionLedger, ConsistencyValidator, MigrationService)
//! - **adapters**: Concrete implementations (git CLI, DuckDB, MySQL, filesystem)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

// Re-export commonly used types at crate root
pub use config::{ConnectionSettings, LedgerTable, RunConfig, Settings};
pub use domain::result::{Error, Result, ScriptEffects};
pub use domain::{LedgerRecord, RevisionId, RunPhase, RunSummary, ScriptChange};
pub use ports::{Database, Reporter, RunEvent, ScriptStatus};
pub use services::{ExecutionLedger, MigrationPlan, MigrationService};
