//! SQLite-backed implementation of the store seams.

use crate::credentials::CredentialStore;
use crate::error::{StoreError, StoreResult};
use crate::runs::RunRecorder;
use crate::session::{RecordStore, StoreSession};
use chrono::{DateTime, Utc};
use crmsync_types::{CanonicalRecord, Credentials, EntityKind, RunId, RunMetrics, ScalarValue};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Local store on a single SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Connection(format!("failed to open {}: {e}", path.display()))
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened {} (journal_mode={})", path.display(), mode);
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Connection(format!("failed to open in-memory store: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS oauth_credentials (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sync_runs (
                run_id TEXT PRIMARY KEY,
                entity TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                insert_count INTEGER NOT NULL,
                update_count INTEGER NOT NULL,
                delete_count INTEGER NOT NULL,
                failed_rows INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Connection("store connection lock poisoned".to_string()))
    }

    /// Loads the most recent recorded runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> StoreResult<Vec<RunMetrics>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, entity, started_at, duration_ms, insert_count, update_count, delete_count, failed_rows
             FROM sync_runs ORDER BY started_at DESC, run_id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (run_id, entity, started_at, duration, inserts, updates, deletes, failed) = row?;
            let run_id = RunId::parse(&run_id)
                .map_err(|e| StoreError::InvalidData(format!("invalid run_id: {e}")))?;
            let entity: EntityKind = entity
                .parse()
                .map_err(|e| StoreError::InvalidData(format!("{e}")))?;
            let started_at = DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| StoreError::InvalidData(format!("invalid started_at: {e}")))?
                .with_timezone(&Utc);

            result.push(RunMetrics {
                run_id,
                entity,
                started_at,
                duration_ms: duration.max(0) as u64,
                insert_count: inserts.max(0) as usize,
                update_count: updates.max(0) as usize,
                delete_count: deletes.max(0) as usize,
                failed_rows: failed.max(0) as usize,
            });
        }
        Ok(result)
    }
}

impl RecordStore for SqliteStore {
    type Session<'a> = SqliteSession<'a>;

    fn session(&self) -> StoreResult<SqliteSession<'_>> {
        debug!("Acquiring store session");
        Ok(SqliteSession { conn: self.lock()? })
    }
}

impl CredentialStore for SqliteStore {
    fn load_credentials(&self) -> StoreResult<Option<Credentials>> {
        let conn = self.lock()?;
        let creds = conn
            .query_row(
                "SELECT access_token, refresh_token FROM oauth_credentials WHERE id = 1",
                [],
                |row| Ok(Credentials::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(creds)
    }

    fn save_credentials(&self, credentials: &Credentials) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO oauth_credentials (id, access_token, refresh_token, updated_at)
             VALUES (1, ?1, ?2, ?3)",
            params![
                credentials.access_token,
                credentials.refresh_token,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn save_access_token(&self, access_token: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE oauth_credentials SET access_token = ?1, updated_at = ?2 WHERE id = 1",
            params![access_token, Utc::now().to_rfc3339()],
        )?;
        if updated != 1 {
            warn!("Access token not persisted: no stored credentials");
            return Err(StoreError::InvalidData(
                "no stored credentials to update".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exclusive hold on the store connection for the length of a run.
pub struct SqliteSession<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl StoreSession for SqliteSession<'_> {
    fn query(&self, sql: &str, params: &[ScalarValue]) -> StoreResult<Vec<CanonicalRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql_value)))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = CanonicalRecord::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), from_sql_value(row.get_ref(idx)?));
            }
            result.push(record);
        }
        Ok(result)
    }

    fn execute(&self, sql: &str, params: &[ScalarValue]) -> StoreResult<usize> {
        let affected = self
            .conn
            .execute(sql, params_from_iter(params.iter().map(to_sql_value)))?;
        Ok(affected)
    }

    fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

impl RunRecorder for SqliteSession<'_> {
    fn record_run(&self, metrics: &RunMetrics) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO sync_runs (run_id, entity, started_at, duration_ms, insert_count, update_count, delete_count, failed_rows)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                metrics.run_id.to_string(),
                metrics.entity.as_str(),
                metrics.started_at.to_rfc3339(),
                metrics.duration_ms as i64,
                metrics.insert_count as i64,
                metrics.update_count as i64,
                metrics.delete_count as i64,
                metrics.failed_rows as i64,
            ],
        )?;
        Ok(())
    }
}

fn to_sql_value(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Null => Value::Null,
        ScalarValue::Bool(b) => Value::Integer(i64::from(*b)),
        ScalarValue::Integer(i) => Value::Integer(*i),
        ScalarValue::Real(r) => Value::Real(*r),
        ScalarValue::Text(s) => Value::Text(s.clone()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(i) => ScalarValue::Integer(i),
        ValueRef::Real(r) => ScalarValue::Real(r),
        ValueRef::Text(t) => ScalarValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => ScalarValue::Text(String::from_utf8_lossy(b).into_owned()),
    }
}
