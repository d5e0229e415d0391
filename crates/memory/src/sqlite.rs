//! SQLite backend for the task queue and project memory.
//!
//! A single SQLite database file with four tables, every one carrying a
//! `namespace` column:
//! - `tasks` — the delegation queue
//! - `memory_records` — versioned facts about produced artifacts
//! - `file_events` — append-only log of observed file writes
//! - `approvals` — human-approval gates
//!
//! The task claim is a conditional UPDATE (`... AND status = 'pending'`)
//! checked via `rows_affected`: exactly one concurrent dispatcher can move a
//! task to in_progress.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use taskloom_core::error::StorageError;
use taskloom_core::namespace::Namespace;
use taskloom_core::record::{ApprovalRequest, FileChangeEvent, MemoryRecord, ProjectState};
use taskloom_core::store::{ClaimOutcome, RecordStore, TaskStore};
use taskloom_core::task::{ExecutionReport, Task, TaskStatus};
use tracing::{debug, info};

/// A production SQLite store for tasks, records, events, and approvals.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id           TEXT PRIMARY KEY,
                namespace    TEXT NOT NULL,
                from_agent   TEXT NOT NULL,
                to_agent     TEXT NOT NULL,
                task_type    TEXT NOT NULL,
                payload      TEXT NOT NULL,
                priority     INTEGER NOT NULL DEFAULT 0,
                status       TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                completed_at TEXT,
                result       TEXT,
                error        TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("tasks table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_dispatch
             ON tasks(namespace, status, priority DESC, created_at ASC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("tasks index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_records (
                iid                  INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace            TEXT NOT NULL,
                file_path            TEXT NOT NULL,
                agent                TEXT NOT NULL,
                kind                 TEXT NOT NULL,
                brief_description    TEXT NOT NULL,
                elements_description TEXT NOT NULL DEFAULT '',
                rationale            TEXT NOT NULL DEFAULT '',
                version              INTEGER NOT NULL,
                quality_score        REAL,
                metadata             TEXT NOT NULL DEFAULT '{}',
                created_at           TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("memory_records table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_path
             ON memory_records(namespace, file_path, version DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("records index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_events (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace       TEXT NOT NULL,
                file_path       TEXT NOT NULL,
                tool_used       TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                session_id      TEXT,
                content_preview TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("file_events table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS approvals (
                id         TEXT PRIMARY KEY,
                namespace  TEXT NOT NULL,
                phase      TEXT NOT NULL,
                agent      TEXT NOT NULL,
                artifacts  TEXT NOT NULL DEFAULT '[]',
                summary    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("approvals table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, StorageError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?;
        let namespace: String = row
            .try_get("namespace")
            .map_err(|e| StorageError::QueryFailed(format!("namespace column: {e}")))?;
        let from_agent: String = row
            .try_get("from_agent")
            .map_err(|e| StorageError::QueryFailed(format!("from_agent column: {e}")))?;
        let to_agent: String = row
            .try_get("to_agent")
            .map_err(|e| StorageError::QueryFailed(format!("to_agent column: {e}")))?;
        let task_type: String = row
            .try_get("task_type")
            .map_err(|e| StorageError::QueryFailed(format!("task_type column: {e}")))?;
        let payload_json: String = row
            .try_get("payload")
            .map_err(|e| StorageError::QueryFailed(format!("payload column: {e}")))?;
        let status_str: String = row
            .try_get("status")
            .map_err(|e| StorageError::QueryFailed(format!("status column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
        let completed_at_str: Option<String> = row
            .try_get("completed_at")
            .map_err(|e| StorageError::QueryFailed(format!("completed_at column: {e}")))?;
        let result_json: Option<String> = row
            .try_get("result")
            .map_err(|e| StorageError::QueryFailed(format!("result column: {e}")))?;
        let error: Option<String> = row
            .try_get("error")
            .map_err(|e| StorageError::QueryFailed(format!("error column: {e}")))?;

        let namespace = Namespace::new(namespace)
            .map_err(|e| StorageError::QueryFailed(format!("stored namespace: {e}")))?;

        let task_type = task_type
            .parse()
            .map_err(|e: String| StorageError::QueryFailed(e))?;

        let payload = serde_json::from_str(&payload_json)
            .map_err(|e| StorageError::QueryFailed(format!("payload value: {e}")))?;

        let status = status_str
            .parse::<TaskStatus>()
            .map_err(|e| StorageError::QueryFailed(e))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::QueryFailed(format!("created_at value: {e}")))?;

        let completed_at = completed_at_str
            .as_deref()
            .map(chrono::DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| StorageError::QueryFailed(format!("completed_at value: {e}")))?
            .map(|dt| dt.with_timezone(&Utc));

        let result = result_json
            .as_deref()
            .map(serde_json::from_str::<ExecutionReport>)
            .transpose()
            .map_err(|e| StorageError::QueryFailed(format!("result value: {e}")))?;

        Ok(Task {
            id,
            namespace,
            from_agent,
            to_agent,
            task_type,
            payload,
            status,
            created_at,
            completed_at,
            result,
            error,
        })
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryRecord, StorageError> {
        let namespace: String = row
            .try_get("namespace")
            .map_err(|e| StorageError::QueryFailed(format!("namespace column: {e}")))?;
        let file_path: String = row
            .try_get("file_path")
            .map_err(|e| StorageError::QueryFailed(format!("file_path column: {e}")))?;
        let agent: String = row
            .try_get("agent")
            .map_err(|e| StorageError::QueryFailed(format!("agent column: {e}")))?;
        let kind_str: String = row
            .try_get("kind")
            .map_err(|e| StorageError::QueryFailed(format!("kind column: {e}")))?;
        let brief_description: String = row
            .try_get("brief_description")
            .map_err(|e| StorageError::QueryFailed(format!("brief_description column: {e}")))?;
        let elements_description: String = row
            .try_get("elements_description")
            .map_err(|e| StorageError::QueryFailed(format!("elements_description column: {e}")))?;
        let rationale: String = row
            .try_get("rationale")
            .map_err(|e| StorageError::QueryFailed(format!("rationale column: {e}")))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| StorageError::QueryFailed(format!("version column: {e}")))?;
        let quality_score: Option<f32> = row
            .try_get("quality_score")
            .map_err(|e| StorageError::QueryFailed(format!("quality_score column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| StorageError::QueryFailed(format!("metadata column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;

        let namespace = Namespace::new(namespace)
            .map_err(|e| StorageError::QueryFailed(format!("stored namespace: {e}")))?;

        let kind = kind_str
            .parse()
            .map_err(|e: String| StorageError::QueryFailed(e))?;

        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(MemoryRecord {
            namespace,
            file_path,
            agent,
            kind,
            brief_description,
            elements_description,
            rationale,
            version,
            quality_score,
            metadata,
            created_at,
        })
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<FileChangeEvent, StorageError> {
        let namespace: String = row
            .try_get("namespace")
            .map_err(|e| StorageError::QueryFailed(format!("namespace column: {e}")))?;
        let file_path: String = row
            .try_get("file_path")
            .map_err(|e| StorageError::QueryFailed(format!("file_path column: {e}")))?;
        let tool_used: String = row
            .try_get("tool_used")
            .map_err(|e| StorageError::QueryFailed(format!("tool_used column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| StorageError::QueryFailed(format!("timestamp column: {e}")))?;
        let session_id: Option<String> = row
            .try_get("session_id")
            .map_err(|e| StorageError::QueryFailed(format!("session_id column: {e}")))?;
        let content_preview: String = row
            .try_get("content_preview")
            .map_err(|e| StorageError::QueryFailed(format!("content_preview column: {e}")))?;

        let namespace = Namespace::new(namespace)
            .map_err(|e| StorageError::QueryFailed(format!("stored namespace: {e}")))?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(FileChangeEvent {
            namespace,
            file_path,
            tool_used,
            timestamp,
            session_id,
            content_preview,
        })
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, task: &Task) -> Result<(), StorageError> {
        let payload = serde_json::to_string(&task.payload)
            .map_err(|e| StorageError::QueryFailed(format!("payload serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, namespace, from_agent, to_agent, task_type, payload, priority, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&task.id)
        .bind(task.namespace.as_str())
        .bind(&task.from_agent)
        .bind(&task.to_agent)
        .bind(task.task_type.as_str())
        .bind(&payload)
        .bind(task.payload.priority)
        .bind(task.status.as_str())
        .bind(task.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("INSERT task: {e}")))?;

        debug!(task_id = %task.id, namespace = %task.namespace, "Task inserted");
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Task>, StorageError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE namespace = ?1 AND id = ?2")
            .bind(namespace.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("GET task: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_task(r)?)),
            None => Ok(None),
        }
    }

    async fn pending(
        &self,
        namespace: &Namespace,
        to_agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Task>, StorageError> {
        let rows = match to_agent {
            Some(agent) => {
                sqlx::query(
                    r#"
                    SELECT * FROM tasks
                    WHERE namespace = ?1 AND status = 'pending' AND to_agent = ?2
                    ORDER BY priority DESC, created_at ASC, rowid ASC
                    LIMIT ?3
                    "#,
                )
                .bind(namespace.as_str())
                .bind(agent)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM tasks
                    WHERE namespace = ?1 AND status = 'pending'
                    ORDER BY priority DESC, created_at ASC, rowid ASC
                    LIMIT ?2
                    "#,
                )
                .bind(namespace.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| StorageError::QueryFailed(format!("SELECT pending: {e}")))?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn claim(&self, namespace: &Namespace, id: &str) -> Result<ClaimOutcome, StorageError> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 'in_progress'
             WHERE namespace = ?1 AND id = ?2 AND status = 'pending'",
        )
        .bind(namespace.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("CLAIM task: {e}")))?;

        if result.rows_affected() == 0 {
            // Lost the race, or the task doesn't exist at all.
            return match self.get(namespace, id).await? {
                Some(_) => Ok(ClaimOutcome::AlreadyClaimed),
                None => Err(StorageError::NotFound(format!("task {id}"))),
            };
        }

        let task = self
            .get(namespace, id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("task {id} vanished after claim")))?;

        debug!(task_id = %id, namespace = %namespace, "Task claimed");
        Ok(ClaimOutcome::Claimed(task))
    }

    async fn complete(
        &self,
        namespace: &Namespace,
        id: &str,
        result: &ExecutionReport,
    ) -> Result<(), StorageError> {
        let result_json = serde_json::to_string(result)
            .map_err(|e| StorageError::QueryFailed(format!("result serialization: {e}")))?;

        let update = sqlx::query(
            "UPDATE tasks SET status = 'completed', completed_at = ?1, result = ?2
             WHERE namespace = ?3 AND id = ?4 AND status = 'in_progress'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&result_json)
        .bind(namespace.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("COMPLETE task: {e}")))?;

        if update.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "task {id} is not in_progress"
            )));
        }
        Ok(())
    }

    async fn fail(
        &self,
        namespace: &Namespace,
        id: &str,
        error: &str,
    ) -> Result<(), StorageError> {
        let update = sqlx::query(
            "UPDATE tasks SET status = 'failed', completed_at = ?1, error = ?2
             WHERE namespace = ?3 AND id = ?4 AND status = 'in_progress'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(error)
        .bind(namespace.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("FAIL task: {e}")))?;

        if update.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "task {id} is not in_progress"
            )));
        }
        Ok(())
    }

    async fn count(
        &self,
        namespace: &Namespace,
        status: Option<TaskStatus>,
    ) -> Result<usize, StorageError> {
        let row = match status {
            Some(s) => {
                sqlx::query(
                    "SELECT COUNT(*) as cnt FROM tasks WHERE namespace = ?1 AND status = ?2",
                )
                .bind(namespace.as_str())
                .bind(s.as_str())
                .fetch_one(&self.pool)
                .await
            }
            None => sqlx::query("SELECT COUNT(*) as cnt FROM tasks WHERE namespace = ?1")
                .bind(namespace.as_str())
                .fetch_one(&self.pool)
                .await,
        }
        .map_err(|e| StorageError::QueryFailed(format!("COUNT tasks: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StorageError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }

    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM tasks WHERE namespace = ?1 AND id = ?2")
            .bind(namespace.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("DELETE task: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_record(&self, record: &MemoryRecord) -> Result<i64, StorageError> {
        // Later writes are new versions, not overwrites.
        let row = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) as v FROM memory_records
             WHERE namespace = ?1 AND file_path = ?2",
        )
        .bind(record.namespace.as_str())
        .bind(&record.file_path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("MAX version: {e}")))?;

        let latest: i64 = row
            .try_get("v")
            .map_err(|e| StorageError::QueryFailed(format!("v column: {e}")))?;
        let version = latest + 1;

        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StorageError::QueryFailed(format!("metadata serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO memory_records
                (namespace, file_path, agent, kind, brief_description, elements_description,
                 rationale, version, quality_score, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(record.namespace.as_str())
        .bind(&record.file_path)
        .bind(&record.agent)
        .bind(record.kind.as_str())
        .bind(&record.brief_description)
        .bind(&record.elements_description)
        .bind(&record.rationale)
        .bind(version)
        .bind(record.quality_score)
        .bind(&metadata)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("INSERT record: {e}")))?;

        debug!(
            namespace = %record.namespace,
            file_path = %record.file_path,
            version,
            "Memory record stored"
        );
        Ok(version)
    }

    async fn records(
        &self,
        namespace: &Namespace,
        agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let rows = match agent {
            Some(a) => {
                sqlx::query(
                    "SELECT * FROM memory_records
                     WHERE namespace = ?1 AND agent = ?2
                     ORDER BY iid DESC LIMIT ?3",
                )
                .bind(namespace.as_str())
                .bind(a)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM memory_records
                     WHERE namespace = ?1
                     ORDER BY iid DESC LIMIT ?2",
                )
                .bind(namespace.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| StorageError::QueryFailed(format!("SELECT records: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn append_event(&self, event: &FileChangeEvent) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO file_events
                (namespace, file_path, tool_used, timestamp, session_id, content_preview)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(event.namespace.as_str())
        .bind(&event.file_path)
        .bind(&event.tool_used)
        .bind(event.timestamp.to_rfc3339())
        .bind(&event.session_id)
        .bind(&event.content_preview)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("INSERT event: {e}")))?;

        Ok(())
    }

    async fn events(
        &self,
        namespace: &Namespace,
        limit: usize,
    ) -> Result<Vec<FileChangeEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM file_events WHERE namespace = ?1 ORDER BY iid DESC LIMIT ?2",
        )
        .bind(namespace.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("SELECT events: {e}")))?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn project_state(&self, namespace: &Namespace) -> Result<ProjectState, StorageError> {
        let files_row = sqlx::query(
            "SELECT COUNT(DISTINCT file_path) as cnt FROM file_events WHERE namespace = ?1",
        )
        .bind(namespace.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("COUNT files: {e}")))?;
        let total_files: i64 = files_row
            .try_get("cnt")
            .map_err(|e| StorageError::QueryFailed(format!("cnt column: {e}")))?;

        let records_row =
            sqlx::query("SELECT COUNT(*) as cnt FROM memory_records WHERE namespace = ?1")
                .bind(namespace.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(format!("COUNT records: {e}")))?;
        let total_records: i64 = records_row
            .try_get("cnt")
            .map_err(|e| StorageError::QueryFailed(format!("cnt column: {e}")))?;

        let last_row = sqlx::query(
            r#"
            SELECT MAX(ts) as ts FROM (
                SELECT MAX(timestamp) as ts FROM file_events WHERE namespace = ?1
                UNION ALL
                SELECT MAX(created_at) as ts FROM memory_records WHERE namespace = ?1
            )
            "#,
        )
        .bind(namespace.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("MAX timestamp: {e}")))?;
        let last_updated_str: Option<String> = last_row
            .try_get("ts")
            .map_err(|e| StorageError::QueryFailed(format!("ts column: {e}")))?;
        let last_updated = last_updated_str
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        // Current phase: the most recent record that carries a phase tag.
        let phase_rows = sqlx::query(
            "SELECT metadata FROM memory_records WHERE namespace = ?1 ORDER BY iid DESC LIMIT 50",
        )
        .bind(namespace.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("SELECT metadata: {e}")))?;

        let mut current_phase = None;
        for row in &phase_rows {
            let metadata_json: String = row
                .try_get("metadata")
                .map_err(|e| StorageError::QueryFailed(format!("metadata column: {e}")))?;
            if let Ok(metadata) =
                serde_json::from_str::<std::collections::BTreeMap<String, serde_json::Value>>(
                    &metadata_json,
                )
            {
                if let Some(phase) = metadata.get("phase").and_then(|v| v.as_str()) {
                    current_phase = Some(phase.to_string());
                    break;
                }
            }
        }

        Ok(ProjectState {
            total_files: total_files as usize,
            total_records: total_records as usize,
            last_updated,
            current_phase,
        })
    }

    async fn insert_approval(&self, approval: &ApprovalRequest) -> Result<(), StorageError> {
        let artifacts = serde_json::to_string(&approval.artifacts)
            .map_err(|e| StorageError::QueryFailed(format!("artifacts serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO approvals (id, namespace, phase, agent, artifacts, summary, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&approval.id)
        .bind(approval.namespace.as_str())
        .bind(&approval.phase)
        .bind(&approval.agent)
        .bind(&artifacts)
        .bind(&approval.summary)
        .bind(approval.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("INSERT approval: {e}")))?;

        Ok(())
    }
}
