//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - git CLI for VersionControl
//! - DuckDB and MySQL for Database
//! - Local filesystem for ScriptSource

pub mod duckdb;
pub mod fs;
pub mod git;
pub mod mysql;
