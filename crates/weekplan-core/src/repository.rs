//! Task repository
//!
//! The application's entry point for tasks. Every mutation is written to the
//! local store first and awaited; when a sync coordinator is attached the
//! resulting task (or deleted id) is then handed to its background queue.
//! Callers never wait on, or see the outcome of, that propagation.
//!
//! ## Usage
//!
//! ```ignore
//! let repo = TaskRepository::new(store).with_sync(coordinator);
//!
//! let task = Task::new("Write report", "work", Priority::High, today);
//! repo.insert(&task).await?;
//! repo.set_completed(&task.id, true).await?;
//!
//! let week = repo.by_date_range(monday, sunday).await?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::models::{CategoryCount, Task, TaskStats};
use crate::storage::LocalStore;
use crate::sync::{SyncCoordinator, SyncError, SyncStart, SyncSummary};

/// Local-first access to tasks
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn LocalStore>,
    sync: Option<SyncCoordinator>,
}

impl TaskRepository {
    /// Repository without sync; mutations stay local
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store, sync: None }
    }

    /// Attach a coordinator that receives every mutation
    pub fn with_sync(mut self, coordinator: SyncCoordinator) -> Self {
        self.sync = Some(coordinator);
        self
    }

    pub fn sync(&self) -> Option<&SyncCoordinator> {
        self.sync.as_ref()
    }

    // ==================== Mutations ====================

    /// Add a new task
    pub async fn insert(&self, task: &Task) -> Result<()> {
        self.store
            .upsert(task)
            .await
            .context("Failed to insert task")?;
        self.propagate(task.clone());
        Ok(())
    }

    /// Save changes to a task, stamping `updated_at`
    ///
    /// Returns the task as stored.
    pub async fn update(&self, mut task: Task) -> Result<Task> {
        task.touch();
        self.store
            .upsert(&task)
            .await
            .context("Failed to update task")?;
        self.propagate(task.clone());
        Ok(task)
    }

    /// Delete a task
    pub async fn delete(&self, task: &Task) -> Result<bool> {
        self.delete_by_id(&task.id).await
    }

    /// Delete a task by ID; returns whether it existed locally
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let removed = self
            .store
            .delete(id)
            .await
            .context("Failed to delete task")?;
        if let Some(sync) = &self.sync {
            sync.delete_task(id);
        }
        Ok(removed)
    }

    /// Mark a task done or not done
    ///
    /// Returns the updated task, or `None` if no task has this ID.
    pub async fn set_completed(&self, id: &str, completed: bool) -> Result<Option<Task>> {
        let found = self
            .store
            .set_completed(id, completed, Utc::now())
            .await
            .context("Failed to update completion")?;
        if !found {
            return Ok(None);
        }

        // Propagate what was actually stored
        let task = self.by_id(id).await?;
        if let Some(task) = &task {
            self.propagate(task.clone());
        }
        Ok(task)
    }

    fn propagate(&self, task: Task) {
        if let Some(sync) = &self.sync {
            sync.sync_single_task(task);
        }
    }

    // ==================== Queries ====================

    /// Get a task by ID
    pub async fn by_id(&self, id: &str) -> Result<Option<Task>> {
        self.store.get(id).await.context("Failed to get task")
    }

    /// Get all tasks, earliest due first
    pub async fn all(&self) -> Result<Vec<Task>> {
        self.store.get_all().await.context("Failed to list tasks")
    }

    /// Tasks due between two days, inclusive
    pub async fn by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Task>> {
        self.store
            .by_date_range(start, end)
            .await
            .context("Failed to query tasks by date")
    }

    /// Tasks due on one day
    pub async fn by_date(&self, date: NaiveDate) -> Result<Vec<Task>> {
        self.by_date_range(date, date).await
    }

    pub async fn by_completion(&self, completed: bool) -> Result<Vec<Task>> {
        self.store
            .by_completion(completed)
            .await
            .context("Failed to query tasks by completion")
    }

    pub async fn by_category(&self, category: &str) -> Result<Vec<Task>> {
        self.store
            .by_category(category)
            .await
            .context("Failed to query tasks by category")
    }

    pub async fn completed_count(&self) -> Result<i64> {
        self.store
            .completed_count()
            .await
            .context("Failed to count completed tasks")
    }

    pub async fn pending_count(&self) -> Result<i64> {
        self.store
            .pending_count()
            .await
            .context("Failed to count pending tasks")
    }

    pub async fn average_productivity_score(&self) -> Result<Option<f64>> {
        self.store
            .average_productivity_score()
            .await
            .context("Failed to average productivity scores")
    }

    pub async fn category_counts(&self) -> Result<Vec<CategoryCount>> {
        self.store
            .category_counts()
            .await
            .context("Failed to count categories")
    }

    /// Completion counts, average score and per-category totals
    pub async fn stats(&self) -> Result<TaskStats> {
        Ok(TaskStats {
            completed: self.completed_count().await?,
            pending: self.pending_count().await?,
            average_score: self.average_productivity_score().await?,
            categories: self.category_counts().await?,
        })
    }

    // ==================== Sync ====================

    /// Run a full sync and wait for it
    ///
    /// Returns `None` when no coordinator is attached.
    pub async fn perform_full_sync(&self) -> Option<Result<SyncSummary, SyncError>> {
        match &self.sync {
            Some(sync) => Some(sync.perform_sync().await),
            None => None,
        }
    }

    /// Start a full sync in the background
    pub fn start_sync(&self) -> SyncStart {
        match &self.sync {
            Some(sync) => sync.start_sync(),
            None => SyncStart::NotAttached,
        }
    }
}
