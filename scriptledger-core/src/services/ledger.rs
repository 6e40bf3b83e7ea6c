//! Execution ledger - the append-only record of every script attempt
//!
//! One row per attempt. Rows are never updated or deleted. The newest row
//! flagged `end_of_batch` is the checkpoint the next run diffs from.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::config::LedgerTable;
use crate::domain::result::{Error, Result};
use crate::domain::{Checkpoint, LedgerRecord, NewLedgerRecord, RevisionId};
use crate::ports::{Database, DbError, DbResult, Dialect, Executor, SqlRow, SqlValue};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Ledger table access for one dialect
#[derive(Debug, Clone)]
pub struct ExecutionLedger {
    table: LedgerTable,
    dialect: Dialect,
}

impl ExecutionLedger {
    pub fn new(table: LedgerTable, dialect: Dialect) -> Self {
        Self { table, dialect }
    }

    pub fn table(&self) -> &LedgerTable {
        &self.table
    }

    /// Create the ledger table if it does not exist
    pub fn ensure_schema(&self, db: &mut dyn Database) -> Result<()> {
        let t = self.table.as_str();
        let ddl = match self.dialect {
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    ordinal BIGINT PRIMARY KEY AUTO_INCREMENT,
                    script_name VARCHAR(500) NOT NULL,
                    completed BOOLEAN,
                    end_of_batch BOOLEAN,
                    last_revision_id VARCHAR(70),
                    created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                    modified_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6)
                )"
            ),
            Dialect::DuckDb => format!(
                "CREATE SEQUENCE IF NOT EXISTS {t}_ordinal_seq START 1;
                CREATE TABLE IF NOT EXISTS {t} (
                    ordinal BIGINT DEFAULT nextval('{t}_ordinal_seq') PRIMARY KEY,
                    script_name VARCHAR(500) NOT NULL,
                    completed BOOLEAN,
                    end_of_batch BOOLEAN,
                    last_revision_id VARCHAR(70),
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    modified_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );"
            ),
        };

        debug!(table = t, "ensuring ledger schema");
        db.execute_batch(&ddl).map_err(Error::Schema)
    }

    /// Newest batch-terminator row, if any
    pub fn checkpoint(&self, db: &mut dyn Database) -> Result<Option<Checkpoint>> {
        let sql = format!(
            "SELECT ordinal, last_revision_id FROM {} WHERE end_of_batch = ? ORDER BY ordinal DESC LIMIT 1",
            self.table
        );
        let rows = db.query(&sql, &[SqlValue::Bool(true)]).map_err(Error::Schema)?;

        match rows.into_iter().next() {
            Some(row) => {
                let ordinal = column(&row, 0)?.as_i64().map_err(Error::Schema)?;
                let revision_id = revision(column(&row, 1)?);
                Ok(Some(Checkpoint { ordinal, revision_id }))
            }
            None => Ok(None),
        }
    }

    /// Revision of the last completed batch; `None` means a fresh environment
    pub fn last_checkpoint_revision(&self, db: &mut dyn Database) -> Result<Option<RevisionId>> {
        Ok(self.checkpoint(db)?.and_then(|c| c.revision_id))
    }

    /// Names of every script that completed, in any run
    pub fn completed_script_names(&self, db: &mut dyn Database) -> Result<HashSet<String>> {
        let sql = format!("SELECT script_name FROM {} WHERE completed = ?", self.table);
        let rows = db.query(&sql, &[SqlValue::Bool(true)]).map_err(Error::Schema)?;

        rows.iter()
            .map(|row| text(column(row, 0)?).map_err(Error::Schema))
            .collect()
    }

    /// Rows written after the checkpoint, oldest first
    pub fn records_since_checkpoint(&self, db: &mut dyn Database) -> Result<Vec<LedgerRecord>> {
        let after = self.checkpoint(db)?.map(|c| c.ordinal).unwrap_or(0);
        let sql = format!("{} WHERE ordinal > ? ORDER BY ordinal ASC", self.select_records());
        let rows = db.query(&sql, &[SqlValue::Int(after)]).map_err(Error::Schema)?;
        rows.iter().map(decode_record).collect()
    }

    /// Full audit trail, oldest first
    pub fn all_records(&self, db: &mut dyn Database) -> Result<Vec<LedgerRecord>> {
        let sql = format!("{} ORDER BY ordinal ASC", self.select_records());
        let rows = db.query(&sql, &[]).map_err(Error::Schema)?;
        rows.iter().map(decode_record).collect()
    }

    pub fn has_records(&self, db: &mut dyn Database) -> Result<bool> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let rows = db.query(&sql, &[]).map_err(Error::Schema)?;
        let count = match rows.first() {
            Some(row) => column(row, 0)?.as_i64().map_err(Error::Schema)?,
            None => 0,
        };
        Ok(count > 0)
    }

    /// Append one row through `executor`
    ///
    /// Pass the script's open transaction to commit the row with the script,
    /// or the connection itself to write it on its own.
    pub fn append<E: Executor + ?Sized>(&self, executor: &mut E, record: &NewLedgerRecord) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO {} (script_name, completed, end_of_batch, last_revision_id) VALUES (?, ?, ?, ?)",
            self.table
        );
        debug!(
            script = %record.script_name,
            completed = record.completed,
            terminator = record.is_batch_terminator,
            "appending ledger row"
        );
        executor.execute(
            &sql,
            &[
                SqlValue::from(record.script_name.as_str()),
                SqlValue::Bool(record.completed),
                SqlValue::Bool(record.is_batch_terminator),
                SqlValue::from(record.revision_id.as_str()),
            ],
        )?;
        Ok(())
    }

    fn select_records(&self) -> String {
        format!(
            "SELECT ordinal, script_name, completed, end_of_batch, last_revision_id, {}, {} FROM {}",
            self.dialect.timestamp_text("created_at"),
            self.dialect.timestamp_text("modified_at"),
            self.table
        )
    }
}

fn column(row: &SqlRow, idx: usize) -> Result<&SqlValue> {
    row.get(idx)
        .ok_or_else(|| Error::Schema(DbError::Decode(format!("missing ledger column {}", idx))))
}

fn text(value: &SqlValue) -> DbResult<String> {
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| DbError::Decode(format!("expected text, got {:?}", value)))
}

fn revision(value: &SqlValue) -> Option<RevisionId> {
    value
        .as_text()
        .filter(|s| !s.is_empty())
        .map(RevisionId::new)
}

fn timestamp(value: &SqlValue) -> DbResult<NaiveDateTime> {
    let raw = text(value)?;
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| DbError::Decode(format!("bad ledger timestamp '{}': {}", raw, e)))
}

fn decode_record(row: &SqlRow) -> Result<LedgerRecord> {
    let decode = || -> DbResult<LedgerRecord> {
        let get = |idx: usize| {
            row.get(idx)
                .ok_or_else(|| DbError::Decode(format!("missing ledger column {}", idx)))
        };
        Ok(LedgerRecord {
            ordinal: get(0)?.as_i64()?,
            script_name: text(get(1)?)?,
            completed: get(2)?.as_bool()?,
            is_batch_terminator: get(3)?.as_bool()?,
            revision_id: revision(get(4)?),
            created_at: timestamp(get(5)?)?,
            modified_at: timestamp(get(6)?)?,
        })
    };
    decode().map_err(Error::Schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbDatabase;

    fn setup() -> (DuckDbDatabase, ExecutionLedger) {
        let mut db = DuckDbDatabase::open_in_memory().unwrap();
        let ledger = ExecutionLedger::new(LedgerTable::default(), db.dialect());
        ledger.ensure_schema(&mut db).unwrap();
        (db, ledger)
    }

    fn rev(id: &str) -> RevisionId {
        RevisionId::new(id)
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let (mut db, ledger) = setup();
        ledger.ensure_schema(&mut db).unwrap();
        assert!(!ledger.has_records(&mut db).unwrap());
    }

    #[test]
    fn test_fresh_ledger_has_no_checkpoint() {
        let (mut db, ledger) = setup();
        assert_eq!(ledger.last_checkpoint_revision(&mut db).unwrap(), None);
        assert!(ledger.completed_script_names(&mut db).unwrap().is_empty());
        assert!(ledger.records_since_checkpoint(&mut db).unwrap().is_empty());
    }

    #[test]
    fn test_checkpoint_is_newest_terminator() {
        let (mut db, ledger) = setup();
        ledger.append(&mut db, &NewLedgerRecord::success("a.sql", rev("c1"), true)).unwrap();
        ledger.append(&mut db, &NewLedgerRecord::success("b.sql", rev("c2"), false)).unwrap();
        ledger.append(&mut db, &NewLedgerRecord::success("c.sql", rev("c2"), true)).unwrap();
        ledger.append(&mut db, &NewLedgerRecord::success("d.sql", rev("c3"), false)).unwrap();

        assert_eq!(ledger.last_checkpoint_revision(&mut db).unwrap(), Some(rev("c2")));
        let checkpoint = ledger.checkpoint(&mut db).unwrap().unwrap();
        assert_eq!(checkpoint.ordinal, 3);

        let since = ledger.records_since_checkpoint(&mut db).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].script_name, "d.sql");
        assert_eq!(since[0].ordinal, 4);
    }

    #[test]
    fn test_completed_names_exclude_failures() {
        let (mut db, ledger) = setup();
        ledger.append(&mut db, &NewLedgerRecord::success("a.sql", rev("c1"), false)).unwrap();
        ledger.append(&mut db, &NewLedgerRecord::failure("b.sql", rev("c1"))).unwrap();

        let completed = ledger.completed_script_names(&mut db).unwrap();
        assert!(completed.contains("a.sql"));
        assert!(!completed.contains("b.sql"));
    }

    #[test]
    fn test_records_since_checkpoint_without_terminator_returns_everything() {
        let (mut db, ledger) = setup();
        ledger.append(&mut db, &NewLedgerRecord::success("a.sql", rev("c1"), false)).unwrap();
        ledger.append(&mut db, &NewLedgerRecord::failure("b.sql", rev("c1"))).unwrap();

        let since = ledger.records_since_checkpoint(&mut db).unwrap();
        let names: Vec<(&str, bool)> = since.iter().map(|r| (r.script_name.as_str(), r.completed)).collect();
        assert_eq!(names, vec![("a.sql", true), ("b.sql", false)]);
        assert_eq!(since[1].revision_id, Some(rev("c1")));
        assert!(!since[1].is_batch_terminator);
    }

    #[test]
    fn test_append_inside_rolled_back_transaction_leaves_no_row() {
        let (mut db, ledger) = setup();
        {
            let mut tx = db.begin().unwrap();
            ledger.append(&mut *tx, &NewLedgerRecord::success("a.sql", rev("c1"), true)).unwrap();
            tx.rollback().unwrap();
        }
        assert!(!ledger.has_records(&mut db).unwrap());

        {
            let mut tx = db.begin().unwrap();
            ledger.append(&mut *tx, &NewLedgerRecord::success("a.sql", rev("c1"), true)).unwrap();
            tx.commit().unwrap();
        }
        let all = ledger.all_records(&mut db).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].created_at <= all[0].modified_at);
    }

    #[test]
    fn test_custom_table_name() {
        let mut db = DuckDbDatabase::open_in_memory().unwrap();
        let ledger = ExecutionLedger::new(LedgerTable::parse("deploy_log").unwrap(), Dialect::DuckDb);
        ledger.ensure_schema(&mut db).unwrap();
        ledger.append(&mut db, &NewLedgerRecord::success("a.sql", rev("c1"), true)).unwrap();

        let rows = db.query("SELECT COUNT(*) FROM deploy_log", &[]).unwrap();
        assert_eq!(rows[0][0].as_i64().unwrap(), 1);
    }
}
