use async_trait::async_trait;
use rusqlite::Connection;
use sqlrun_common::{Error, Result};
use sqlrun_engine::{StatementExecutor, TableLister};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// SQLite connection used as the engine's statement executor.
///
/// Every call prepares exactly one statement; the engine does the splitting.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    fn execute_sync(&self, sql: &str) -> Result<u64> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql).map_err(db_error)?;

        if stmt.column_count() == 0 {
            let changed = stmt.execute([]).map_err(db_error)?;
            debug!(changed, "statement executed");
            // sqlite3_changes() keeps the last DML count across DDL statements
            return Ok(if modifies_rows(sql) { changed as u64 } else { 0 });
        }

        // row-returning statements are stepped to completion; DML with RETURNING
        // still reports the rows it changed
        let mut rows = stmt.query([]).map_err(db_error)?;
        while rows.next().map_err(db_error)?.is_some() {}
        drop(rows);
        drop(stmt);
        Ok(if modifies_rows(sql) { conn.changes() } else { 0 })
    }

    fn list_tables_sync(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| Error::Database(format!("failed to prepare table listing: {e}")))?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to list tables: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read table name: {e}")))?;

        Ok(tables)
    }
}

#[async_trait]
impl StatementExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.execute_sync(sql)
    }
}

#[async_trait]
impl TableLister for SqliteExecutor {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.list_tables_sync()
    }
}

fn modifies_rows(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    ["INSERT", "UPDATE", "DELETE", "REPLACE", "WITH"]
        .iter()
        .any(|kw| first.eq_ignore_ascii_case(kw))
}

// Keep SQLite's own wording so idempotent-skip patterns can match it.
fn db_error(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}
