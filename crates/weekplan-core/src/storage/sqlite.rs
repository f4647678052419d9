//! SQLite task store
//!
//! Implements [`LocalStore`] on a single rusqlite connection. The connection
//! sits behind a mutex so writes are serialized; each call runs on tokio's
//! blocking pool so disk I/O never stalls the async workers.
//!
//! ## Tables
//!
//! - `tasks` - Task records, timestamps as epoch milliseconds
//! - `schema_info` - Schema version

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Params, Row};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use super::LocalStore;
use crate::config::Config;
use crate::millis;
use crate::models::{validate_score, CategoryCount, ModelError, Priority, Task};

const TASK_COLUMNS: &str = "id, title, description, category, priority, due_date, due_time, \
     is_completed, productivity_score, created_at, updated_at";

const TASK_ORDER: &str = "ORDER BY due_date ASC, priority DESC, created_at ASC";

/// SQLite-backed local task store
#[derive(Clone)]
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Open or create the task database under the configured data dir
    pub fn open(config: &Config) -> StorageResult<Self> {
        let path = config.sqlite_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!("Opened task database at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Total number of stored tasks
    pub async fn count(&self) -> StorageResult<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?))
            .await
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))?
    }

    async fn query_tasks<P>(&self, filter: &'static str, params: P) -> StorageResult<Vec<Task>>
    where
        P: Params + Send + 'static,
    {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM tasks {} {}", TASK_COLUMNS, filter, TASK_ORDER);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params, TaskRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(TaskRow::into_task).collect()
        })
        .await
    }
}

#[async_trait]
impl LocalStore for SqliteTaskStore {
    async fn get(&self, id: &str) -> StorageResult<Option<Task>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;

            match rows.next()? {
                Some(row) => Ok(Some(TaskRow::from_row(row)?.into_task()?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn get_all(&self) -> StorageResult<Vec<Task>> {
        // One statement under the connection lock, so the list is a snapshot
        self.query_tasks("", []).await
    }

    async fn upsert(&self, task: &Task) -> StorageResult<()> {
        let task = task.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO tasks (
                    id, title, description, category, priority, due_date, due_time,
                    is_completed, productivity_score, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.category,
                    task.priority.value(),
                    millis::from_date(task.due_date),
                    task.due_time.map(millis::from_time_of_day),
                    task.is_completed,
                    task.productivity_score,
                    millis::from_datetime(&task.created_at),
                    millis::from_datetime(&task.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM tasks WHERE id = ?", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn set_completed(
        &self,
        id: &str,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET is_completed = ?, updated_at = ? WHERE id = ?",
                params![completed, millis::from_datetime(&now), id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn by_date_range(&self, start: NaiveDate, end: NaiveDate) -> StorageResult<Vec<Task>> {
        self.query_tasks(
            "WHERE due_date BETWEEN ?1 AND ?2",
            [millis::from_date(start), millis::from_date(end)],
        )
        .await
    }

    async fn by_completion(&self, completed: bool) -> StorageResult<Vec<Task>> {
        self.query_tasks("WHERE is_completed = ?1", [completed]).await
    }

    async fn by_category(&self, category: &str) -> StorageResult<Vec<Task>> {
        self.query_tasks("WHERE category = ?1", [category.to_string()])
            .await
    }

    async fn completed_count(&self) -> StorageResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE is_completed = 1",
                [],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn pending_count(&self) -> StorageResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE is_completed = 0",
                [],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn average_productivity_score(&self) -> StorageResult<Option<f64>> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT AVG(productivity_score) FROM tasks WHERE productivity_score IS NOT NULL",
                [],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn category_counts(&self) -> StorageResult<Vec<CategoryCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT category, COUNT(*) AS count
                FROM tasks
                GROUP BY category
                ORDER BY count DESC, category
                "#,
            )?;
            let counts = stmt
                .query_map([], |row| {
                    Ok(CategoryCount {
                        category: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(counts)
        })
        .await
    }
}

// ==================== Internal structs ====================

struct TaskRow {
    id: String,
    title: String,
    description: String,
    category: String,
    priority: i64,
    due_date: i64,
    due_time: Option<i64>,
    is_completed: bool,
    productivity_score: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            priority: row.get(4)?,
            due_date: row.get(5)?,
            due_time: row.get(6)?,
            is_completed: row.get(7)?,
            productivity_score: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    /// Hydrate a task, validating enumerated fields
    fn into_task(self) -> StorageResult<Task> {
        let invalid = |id: &str, source: ModelError| StorageError::InvalidRecord {
            id: id.to_string(),
            source,
        };

        let priority = Priority::try_from(self.priority).map_err(|e| invalid(&self.id, e))?;
        let productivity_score = self
            .productivity_score
            .map(validate_score)
            .transpose()
            .map_err(|e| invalid(&self.id, e))?;

        let timestamp = |ms: i64| ModelError::InvalidTimestamp(ms);
        let due_date = millis::to_date(self.due_date)
            .ok_or_else(|| invalid(&self.id, timestamp(self.due_date)))?;
        let created_at = millis::to_datetime(self.created_at)
            .ok_or_else(|| invalid(&self.id, timestamp(self.created_at)))?;
        let updated_at = millis::to_datetime(self.updated_at)
            .ok_or_else(|| invalid(&self.id, timestamp(self.updated_at)))?;

        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            priority,
            due_date,
            due_time: self.due_time.and_then(millis::to_time_of_day),
            is_completed: self.is_completed,
            productivity_score,
            created_at,
            updated_at,
        })
    }
}
