//! Database port - the transactional executor scripts run against

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("SQL execution failed: {0}")]
    Execution(String),

    #[error("unexpected column value: {0}")]
    Decode(String),
}

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

/// SQL dialect of a backend; decides the ledger DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    DuckDb,
    MySql,
}

impl Dialect {
    /// Expression rendering a timestamp column as text
    pub fn timestamp_text(&self, column: &str) -> String {
        match self {
            Dialect::DuckDb => format!("CAST({} AS VARCHAR)", column),
            Dialect::MySql => format!("CAST({} AS CHAR)", column),
        }
    }
}

/// A bound parameter or a column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SqlValue {
    /// Boolean view; MySQL reports BOOLEAN columns as integers and NULL reads as false
    pub fn as_bool(&self) -> DbResult<bool> {
        match self {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(i) => Ok(*i != 0),
            SqlValue::Text(s) => Err(DbError::Decode(format!("expected boolean, got '{}'", s))),
        }
    }

    pub fn as_i64(&self) -> DbResult<i64> {
        match self {
            SqlValue::Int(i) => Ok(*i),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| DbError::Decode(format!("expected integer, got '{}'", s))),
            other => Err(DbError::Decode(format!("expected integer, got {:?}", other))),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

/// One result row, columns in SELECT order
pub type SqlRow = Vec<SqlValue>;

/// Anything that can run statements: the connection itself (autocommit)
/// or an open transaction.
pub trait Executor {
    /// Execute one statement with positional `?` parameters, returns affected rows
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Execute a batch of one or more statements as a single call
    fn execute_batch(&mut self, sql: &str) -> DbResult<()>;
}

/// Database connection abstraction
///
/// All calls block; there is no internal timeout.
pub trait Database: Executor {
    fn dialect(&self) -> Dialect;

    /// Run a query with positional `?` parameters
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>>;

    /// Open a transaction. The connection is unusable until it is finished.
    fn begin(&mut self) -> DbResult<Box<dyn Transaction + '_>>;
}

/// An open transaction
///
/// Dropping it without calling `commit` rolls it back.
pub trait Transaction: Executor {
    fn commit(self: Box<Self>) -> DbResult<()>;

    fn rollback(self: Box<Self>) -> DbResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bool_accepts_mysql_integers() {
        assert!(SqlValue::Int(1).as_bool().unwrap());
        assert!(!SqlValue::Int(0).as_bool().unwrap());
        assert!(SqlValue::Bool(true).as_bool().unwrap());
        assert!(!SqlValue::Null.as_bool().unwrap());
        assert!(SqlValue::from("yes").as_bool().is_err());
    }

    #[test]
    fn test_as_i64_parses_text() {
        assert_eq!(SqlValue::Int(7).as_i64().unwrap(), 7);
        assert_eq!(SqlValue::from("42").as_i64().unwrap(), 42);
        assert!(SqlValue::Null.as_i64().is_err());
    }

    #[test]
    fn test_timestamp_text_per_dialect() {
        assert_eq!(Dialect::DuckDb.timestamp_text("created_at"), "CAST(created_at AS VARCHAR)");
        assert_eq!(Dialect::MySql.timestamp_text("created_at"), "CAST(created_at AS CHAR)");
    }
}
