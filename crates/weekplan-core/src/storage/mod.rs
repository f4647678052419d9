//! Storage layer
//!
//! The on-device task store is the system of record while the app runs.
//!
//! ## Architecture
//!
//! - **LocalStore**: async interface consumed by the repository and the
//!   sync coordinator. Every call is a suspension point.
//! - **SqliteTaskStore**: SQLite implementation; queries run on the blocking
//!   thread pool behind a single serialized connection.
//! - **files**: atomic writes for small state files kept outside the database.

pub mod error;
pub mod files;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{CategoryCount, Task};

pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteTaskStore;

/// Persisted, queryable collection of tasks on this device
///
/// List queries are ordered by due date, then highest priority first.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Get a task by ID
    async fn get(&self, id: &str) -> StorageResult<Option<Task>>;

    /// Consistent point-in-time snapshot of every task
    async fn get_all(&self) -> StorageResult<Vec<Task>>;

    /// Insert or replace the task with the same ID
    async fn upsert(&self, task: &Task) -> StorageResult<()>;

    /// Delete a task; returns whether a row was removed
    async fn delete(&self, id: &str) -> StorageResult<bool>;

    /// Set completion and stamp `updated_at = now`; returns whether the task exists
    async fn set_completed(&self, id: &str, completed: bool, now: DateTime<Utc>)
        -> StorageResult<bool>;

    /// Tasks due between `start` and `end`, both days inclusive
    async fn by_date_range(&self, start: NaiveDate, end: NaiveDate) -> StorageResult<Vec<Task>>;

    async fn by_completion(&self, completed: bool) -> StorageResult<Vec<Task>>;

    async fn by_category(&self, category: &str) -> StorageResult<Vec<Task>>;

    async fn completed_count(&self) -> StorageResult<i64>;

    async fn pending_count(&self) -> StorageResult<i64>;

    /// Mean of the scores that are set, `None` when no task has one
    async fn average_productivity_score(&self) -> StorageResult<Option<f64>>;

    /// Task count per category, largest first
    async fn category_counts(&self) -> StorageResult<Vec<CategoryCount>>;
}
