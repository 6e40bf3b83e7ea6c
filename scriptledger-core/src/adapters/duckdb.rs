//! DuckDB implementation of the Database port

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use tracing::{debug, warn};

use crate::ports::{Database, DbError, DbResult, Dialect, Executor, SqlRow, SqlValue, Transaction};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::Execution(err.to_string())
    }
}

/// DuckDB database, file-backed or in memory
pub struct DuckDbDatabase {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl DuckDbDatabase {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn open(db_path: &Path) -> DbResult<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn,
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            "database busy, retrying: {}",
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DbError::Connection(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        let config = duckdb::Config::default()
            .enable_autoload_extension(false)
            .map_err(|e| DbError::Connection(e.to_string()))?;
        let conn = Connection::open_in_memory_with_flags(config)
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(Self { conn, db_path: None })
    }

    fn try_open_connection(db_path: &Path) -> DbResult<Connection> {
        // Extension autoloading stays off: cached extensions can fail code signing on macOS
        let config = duckdb::Config::default()
            .enable_autoload_extension(false)
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Connection::open_with_flags(db_path, config).map_err(|e| DbError::Connection(e.to_string()))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

fn to_duck(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Boolean(*b),
        SqlValue::Int(i) => Value::BigInt(*i),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

fn from_duck(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Bool(b),
        Value::TinyInt(i) => SqlValue::Int(i.into()),
        Value::SmallInt(i) => SqlValue::Int(i.into()),
        Value::Int(i) => SqlValue::Int(i.into()),
        Value::BigInt(i) => SqlValue::Int(i),
        Value::HugeInt(i) => SqlValue::Int(i as i64),
        Value::UTinyInt(i) => SqlValue::Int(i.into()),
        Value::USmallInt(i) => SqlValue::Int(i.into()),
        Value::UInt(i) => SqlValue::Int(i.into()),
        Value::UBigInt(i) => SqlValue::Int(i as i64),
        Value::Text(s) => SqlValue::Text(s),
        other => SqlValue::Text(format!("{:?}", other)),
    }
}

/// Read every column of a row; duckdb reports the end as an invalid index
fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<SqlRow> {
    let mut values = Vec::new();
    let mut idx = 0;
    loop {
        match row.get::<_, Value>(idx) {
            Ok(v) => values.push(from_duck(v)),
            Err(duckdb::Error::InvalidColumnIndex(_)) => break,
            Err(e) => return Err(e),
        }
        idx += 1;
    }
    Ok(values)
}

impl Executor for DuckDbDatabase {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        debug!(sql, "duckdb execute");
        Ok(self.conn.execute(sql, params_from_iter(params.iter().map(to_duck)))?)
    }

    fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }
}

impl Database for DuckDbDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>> {
        debug!(sql, "duckdb query");
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter().map(to_duck)), read_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn begin(&mut self) -> DbResult<Box<dyn Transaction + '_>> {
        let tx = self.conn.transaction()?;
        Ok(Box::new(DuckDbTransaction { tx }))
    }
}

/// Open DuckDB transaction; rolls back on drop
struct DuckDbTransaction<'c> {
    tx: duckdb::Transaction<'c>,
}

impl Executor for DuckDbTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        debug!(sql, "duckdb execute in transaction");
        Ok(self.tx.execute(sql, params_from_iter(params.iter().map(to_duck)))?)
    }

    fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        Ok(self.tx.execute_batch(sql)?)
    }
}

impl Transaction for DuckDbTransaction<'_> {
    fn commit(self: Box<Self>) -> DbResult<()> {
        let this = *self;
        Ok(this.tx.commit()?)
    }

    fn rollback(self: Box<Self>) -> DbResult<()> {
        let this = *self;
        Ok(this.tx.rollback()?)
    }
}
