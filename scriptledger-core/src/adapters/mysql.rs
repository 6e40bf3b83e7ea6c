//! MySQL implementation of the Database port
//!
//! Script batches go through the text protocol so multi-statement files
//! run as one call; ledger statements use prepared statements.

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params, TxOpts, Value};
use tracing::debug;

use crate::config::ConnectionSettings;
use crate::ports::{Database, DbError, DbResult, Dialect, Executor, SqlRow, SqlValue, Transaction};

impl From<mysql::Error> for DbError {
    fn from(err: mysql::Error) -> Self {
        DbError::Execution(err.to_string())
    }
}

/// Single blocking MySQL connection
pub struct MysqlDatabase {
    conn: Conn,
}

impl MysqlDatabase {
    /// Connect and verify the server answers
    pub fn connect(settings: &ConnectionSettings) -> DbResult<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(settings.host.clone()))
            .tcp_port(settings.port)
            .user(Some(settings.user.clone()))
            .pass(Some(settings.password.clone()))
            .db_name(Some(settings.database.clone()));

        let mut conn = Conn::new(opts).map_err(|e| DbError::Connection(e.to_string()))?;
        conn.query_drop("SELECT 1")
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { conn })
    }
}

fn to_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(
        params
            .iter()
            .map(|v| match v {
                SqlValue::Null => Value::NULL,
                SqlValue::Bool(b) => Value::Int(i64::from(*b)),
                SqlValue::Int(i) => Value::Int(*i),
                SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
            })
            .collect(),
    )
}

fn from_mysql(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => SqlValue::Int(u as i64),
        Value::Bytes(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Float(f) => SqlValue::Text(f.to_string()),
        Value::Double(f) => SqlValue::Text(f.to_string()),
        Value::Date(y, mo, d, h, mi, s, us) => SqlValue::Text(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            y, mo, d, h, mi, s, us
        )),
        other => SqlValue::Text(other.as_sql(true)),
    }
}

impl Executor for MysqlDatabase {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        debug!(sql, "mysql execute");
        self.conn.exec_drop(sql, to_params(params))?;
        Ok(self.conn.affected_rows() as usize)
    }

    fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        Ok(self.conn.query_drop(sql)?)
    }
}

impl Database for MysqlDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>> {
        debug!(sql, "mysql query");
        let rows: Vec<mysql::Row> = self.conn.exec(sql, to_params(params))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.unwrap_raw()
                    .into_iter()
                    .map(|v| v.map(from_mysql).unwrap_or(SqlValue::Null))
                    .collect()
            })
            .collect())
    }

    fn begin(&mut self) -> DbResult<Box<dyn Transaction + '_>> {
        let tx = self.conn.start_transaction(TxOpts::default())?;
        Ok(Box::new(MysqlTransaction { tx }))
    }
}

/// Open MySQL transaction; rolls back on drop
struct MysqlTransaction<'c> {
    tx: mysql::Transaction<'c>,
}

impl Executor for MysqlTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        debug!(sql, "mysql execute in transaction");
        self.tx.exec_drop(sql, to_params(params))?;
        Ok(self.tx.affected_rows() as usize)
    }

    fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        Ok(self.tx.query_drop(sql)?)
    }
}

impl Transaction for MysqlTransaction<'_> {
    fn commit(self: Box<Self>) -> DbResult<()> {
        let this = *self;
        Ok(this.tx.commit()?)
    }

    fn rollback(self: Box<Self>) -> DbResult<()> {
        let this = *self;
        Ok(this.tx.rollback()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_params_binds_positionally() {
        let params = to_params(&[SqlValue::from("a.sql"), SqlValue::Bool(true), SqlValue::Int(3), SqlValue::Null]);
        match params {
            Params::Positional(values) => assert_eq!(
                values,
                vec![Value::Bytes(b"a.sql".to_vec()), Value::Int(1), Value::Int(3), Value::NULL]
            ),
            other => panic!("expected positional params, got {:?}", other),
        }
        assert!(matches!(to_params(&[]), Params::Empty));
    }

    #[test]
    fn test_from_mysql_decodes_text_protocol_values() {
        assert_eq!(from_mysql(Value::Bytes(b"2026-01-02 03:04:05".to_vec())), SqlValue::from("2026-01-02 03:04:05"));
        assert_eq!(from_mysql(Value::UInt(9)), SqlValue::Int(9));
        assert_eq!(from_mysql(Value::NULL), SqlValue::Null);
        assert_eq!(
            from_mysql(Value::Date(2026, 1, 2, 3, 4, 5, 0)),
            SqlValue::from("2026-01-02 03:04:05.000000")
        );
    }
}
