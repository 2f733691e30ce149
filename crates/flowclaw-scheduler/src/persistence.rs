//! SQLite-backed execution store.
//! Survives restarts; every status write is one transaction with a monotonic check.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowclaw_core::config::{StoreConfig, expand_path};
use flowclaw_core::error::{FlowClawError, Result};
use flowclaw_core::traits::ExecutionStore;
use flowclaw_core::types::{Execution, ExecutionStatus, StatusUpdate};
use rusqlite::{Connection, OptionalExtension, params};

use crate::store::{MemoryExecutionStore, apply_update, check_transition};

const SELECT_COLUMNS: &str = "id, workflow_id, status, created_at, started_at, completed_at, trigger_input, result, error";

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> FlowClawError + '_ {
    move |e| FlowClawError::Persistence(format!("{context}: {e}"))
}

/// Row as stored, before timestamp and JSON decoding.
struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    trigger: String,
    result: Option<String>,
    error: Option<String>,
}

impl ExecutionRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            workflow_id: row.get(1)?,
            status: row.get(2)?,
            created_at: row.get(3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            trigger: row.get(6)?,
            result: row.get(7)?,
            error: row.get(8)?,
        })
    }

    fn into_execution(self) -> Result<Execution> {
        let status = ExecutionStatus::parse(&self.status).ok_or_else(|| {
            FlowClawError::Persistence(format!("execution {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(Execution {
            status,
            created_at: parse_time(&self.created_at)?,
            started_at: self.started_at.as_deref().map(parse_time).transpose()?,
            completed_at: self.completed_at.as_deref().map(parse_time).transpose()?,
            trigger: serde_json::from_str(&self.trigger)?,
            result: self.result.as_deref().map(serde_json::from_str).transpose()?,
            error: self.error,
            id: self.id,
            workflow_id: self.workflow_id,
        })
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FlowClawError::Persistence(format!("bad timestamp '{s}': {e}")))
}

/// SQLite execution store.
pub struct SqliteExecutionStore {
    conn: Mutex<Connection>,
}

impl SqliteExecutionStore {
    /// Open or create the executions database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::info!("💾 Execution store: {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB open"))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.lock()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,            -- PENDING, RUNNING, COMPLETED, FAILED
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                trigger_input TEXT NOT NULL,     -- JSON
                result TEXT,                     -- JSON
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_executions_workflow
                ON executions (workflow_id, created_at);
         ",
            )
            .map_err(db_err("Migration"))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExecutionStore for SqliteExecutionStore {
    async fn create_execution(&self, workflow_id: &str, trigger: serde_json::Value) -> Result<Execution> {
        let execution = Execution::new(workflow_id, trigger);
        self.lock()
            .execute(
                "INSERT INTO executions (id, workflow_id, status, created_at, trigger_input)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    execution.id,
                    execution.workflow_id,
                    execution.status.as_str(),
                    execution.created_at.to_rfc3339(),
                    execution.trigger.to_string(),
                ],
            )
            .map_err(db_err("Create execution"))?;
        Ok(execution)
    }

    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        update: StatusUpdate,
    ) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err("Begin"))?;

        let row = tx
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM executions WHERE id = ?1"),
                params![execution_id],
                ExecutionRow::read,
            )
            .optional()
            .map_err(db_err("Load execution"))?
            .ok_or_else(|| FlowClawError::Persistence(format!("execution {execution_id} not found")))?;
        let mut execution = row.into_execution()?;

        check_transition(execution_id, execution.status, status)?;
        apply_update(&mut execution, status, update);

        tx.execute(
            "UPDATE executions
             SET status = ?2, started_at = ?3, completed_at = ?4, result = ?5, error = ?6
             WHERE id = ?1",
            params![
                execution_id,
                execution.status.as_str(),
                execution.started_at.map(|t| t.to_rfc3339()),
                execution.completed_at.map(|t| t.to_rfc3339()),
                execution.result.as_ref().map(|v| v.to_string()),
                execution.error,
            ],
        )
        .map_err(db_err("Update execution"))?;
        tx.commit().map_err(db_err("Commit"))
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>> {
        let row = self
            .lock()
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM executions WHERE id = ?1"),
                params![execution_id],
                ExecutionRow::read,
            )
            .optional()
            .map_err(db_err("Load execution"))?;
        row.map(ExecutionRow::into_execution).transpose()
    }

    async fn list_executions(&self, workflow_id: &str, limit: usize) -> Result<Vec<Execution>> {
        let rows = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM executions WHERE workflow_id = ?1
                     ORDER BY rowid DESC LIMIT ?2"
                ))
                .map_err(db_err("List executions"))?;
            stmt.query_map(params![workflow_id, limit as i64], ExecutionRow::read)
                .map_err(db_err("List executions"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("List executions"))?
        };
        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }
}

/// Open the execution store selected by `[store]`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ExecutionStore>> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteExecutionStore::open(&expand_path(&config.path))?)),
        "memory" => {
            tracing::warn!("⚠️ In-memory execution store — history is lost on exit");
            Ok(Arc::new(MemoryExecutionStore::new()))
        }
        other => Err(FlowClawError::Config(format!(
            "unknown store backend '{other}' (expected 'sqlite' or 'memory')"
        ))),
    }
}
