//! Sync coordinator
//!
//! Owns everything that moves tasks between the local store and the remote
//! table: full syncs (push then pull), the single-flight guard, the bookmark,
//! background propagation of single-task changes, the realtime subscription
//! and the periodic timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::bookmark::SyncBookmark;
use super::error::SyncError;
use super::guard::{SyncGuard, SyncPermit, SyncPhase};
use super::propagation::{Job, Propagator};
use crate::auth::{AuthGate, User};
use crate::config::Config;
use crate::models::Task;
use crate::remote::{ChangeEvent, ChangeStream, RemoteClient, RemoteTaskRow};
use crate::storage::LocalStore;

/// Outcome of a successful full sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    /// Rows sent in the push
    pub pushed: usize,
    /// Rows fetched and written locally in the pull
    pub pulled: usize,
    /// Bookmark after the pull
    pub bookmark: DateTime<Utc>,
}

/// Result of asking for a background full sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStart {
    Started,
    /// A full sync is in flight; nothing was done
    AlreadyRunning,
    /// No user is signed in; nothing was done
    SignedOut,
    /// No coordinator is attached
    NotAttached,
}

/// Tunables for the coordinator
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Capacity of the propagation queue
    pub propagation_queue: usize,
    /// Concurrent propagation requests
    pub propagation_workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            propagation_queue: config.propagation_queue,
            propagation_workers: config.propagation_workers,
        }
    }
}

/// Coordinates local/remote task synchronization
///
/// Cheap to clone; clones share state. Must be created inside a tokio
/// runtime because the propagation worker starts immediately.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteClient>,
    auth: Arc<dyn AuthGate>,
    bookmark: SyncBookmark,
    guard: SyncGuard,
    propagator: Propagator,
    realtime: Mutex<Option<JoinHandle<()>>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteClient>,
        auth: Arc<dyn AuthGate>,
        bookmark: SyncBookmark,
        options: SyncOptions,
    ) -> Self {
        let propagator = Propagator::spawn(
            Arc::clone(&remote),
            Arc::clone(&auth),
            options.propagation_queue,
            options.propagation_workers,
        );

        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                auth,
                bookmark,
                guard: SyncGuard::new(),
                propagator,
                realtime: Mutex::new(None),
                periodic: Mutex::new(None),
            }),
        }
    }

    // ==================== Full sync ====================

    /// Push every local task, then pull remote changes since the bookmark
    ///
    /// Returns `AuthRequired` when signed out and `AlreadyRunning` when
    /// another full sync holds the guard, both without touching the phase.
    pub async fn perform_sync(&self) -> Result<SyncSummary, SyncError> {
        if !self.inner.auth.is_authenticated() {
            info!("Sync skipped: not signed in");
            return Err(SyncError::AuthRequired);
        }
        let Some(permit) = self.inner.guard.try_acquire() else {
            debug!("Sync requested while another is running");
            return Err(SyncError::AlreadyRunning);
        };
        self.inner.full_sync(permit).await
    }

    /// Start a full sync in the background unless one is running
    pub fn start_sync(&self) -> SyncStart {
        if !self.inner.auth.is_authenticated() {
            debug!("Not signed in, not starting sync");
            return SyncStart::SignedOut;
        }
        let Some(permit) = self.inner.guard.try_acquire() else {
            debug!("Sync already running, not starting another");
            return SyncStart::AlreadyRunning;
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // Outcome is logged by full_sync
            let _ = inner.full_sync(permit).await;
        });
        SyncStart::Started
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.guard.phase()
    }

    /// Observe `Idle`/`Syncing` transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.inner.guard.subscribe()
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.inner.bookmark.get()
    }

    // ==================== Propagation ====================

    /// Queue a push of one task; returns whether it was queued
    ///
    /// Silently does nothing when signed out. Never touches the bookmark.
    pub fn sync_single_task(&self, task: Task) -> bool {
        if !self.inner.auth.is_authenticated() {
            debug!("Not signed in, not propagating task {}", task.id);
            return false;
        }
        self.inner.propagator.enqueue(Job::Upsert(task))
    }

    /// Queue a remote delete of one task; returns whether it was queued
    pub fn delete_task(&self, id: &str) -> bool {
        if !self.inner.auth.is_authenticated() {
            debug!("Not signed in, not propagating delete of {}", id);
            return false;
        }
        self.inner.propagator.enqueue(Job::Delete(id.to_string()))
    }

    // ==================== Realtime ====================

    /// Subscribe to remote changes, replacing any earlier subscription
    ///
    /// Every change notification triggers an incremental pull. Does nothing
    /// when signed out.
    pub async fn start(&self) {
        self.stop();

        let Some(user) = self.inner.auth.current_user() else {
            debug!("Not signed in, realtime subscription not started");
            return;
        };

        let stream = self.inner.remote.subscribe_to_changes(&user.id).await;
        let handle = tokio::spawn(consume_changes(Arc::clone(&self.inner), stream));

        let previous = self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!("Realtime sync started for user {}", user.id);
    }

    /// Cancel the realtime subscription
    pub fn stop(&self) {
        let handle = self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Realtime sync stopped");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .realtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ==================== Lifecycle ====================

    /// Request a background full sync every `interval`, replacing any earlier timer
    ///
    /// The first request fires one interval from now.
    pub fn start_periodic(&self, interval: Duration) {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if coordinator.start_sync() == SyncStart::AlreadyRunning {
                    debug!("Periodic sync skipped, previous sync still running");
                }
            }
        });

        let previous = self
            .inner
            .periodic
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!("Periodic sync every {:?}", interval);
    }

    pub fn stop_periodic(&self) {
        let handle = self
            .inner
            .periodic
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Stop realtime and the timer, wait for a running full sync, then drain
    /// the propagation queue
    ///
    /// Changes queued before this call are sent before it returns; later
    /// propagation requests are dropped.
    pub async fn shutdown(&self) {
        self.stop();
        self.stop_periodic();

        drop(self.inner.guard.acquire().await);
        self.inner.propagator.close_and_drain().await;
        info!("Sync coordinator shut down");
    }
}

impl Inner {
    /// Full sync body; the permit is released on return or unwind
    async fn full_sync(&self, _permit: SyncPermit) -> Result<SyncSummary, SyncError> {
        let result = self.push_then_pull().await;
        match &result {
            Ok(summary) => info!(
                "Sync complete: pushed {}, pulled {}",
                summary.pushed, summary.pulled
            ),
            Err(SyncError::AuthRequired) => info!("Sync skipped: not signed in"),
            Err(e) => warn!("Sync failed: {}", e),
        }
        result
    }

    async fn push_then_pull(&self) -> Result<SyncSummary, SyncError> {
        let user = self.auth.current_user().ok_or(SyncError::AuthRequired)?;

        let pushed = self.push(&user).await?;
        let (pulled, bookmark) = self.pull(&user).await?;

        Ok(SyncSummary {
            pushed,
            pulled,
            bookmark,
        })
    }

    /// Upload a fresh snapshot of every local task
    async fn push(&self, user: &User) -> Result<usize, SyncError> {
        let tasks = self.store.get_all().await?;
        let rows: Vec<RemoteTaskRow> = tasks
            .iter()
            .map(|task| RemoteTaskRow::from_task(task, &user.id))
            .collect();

        debug!("Pushing {} tasks", rows.len());
        self.remote.upsert_rows(&rows).await?;
        Ok(rows.len())
    }

    /// Fetch rows changed since the bookmark and overwrite local copies
    ///
    /// The bookmark advances to the moment just before the fetch was issued,
    /// and only once every fetched row is stored.
    async fn pull(&self, user: &User) -> Result<(usize, DateTime<Utc>), SyncError> {
        let since = self.bookmark.get();
        let started = Utc::now();

        let rows = self.remote.select_rows_for_user(&user.id, since).await?;
        debug!("Pulled {} rows changed since {:?}", rows.len(), since);

        let mut pulled = 0;
        for row in rows {
            match Task::try_from(row) {
                Ok(task) => {
                    self.store.upsert(&task).await?;
                    pulled += 1;
                }
                Err(e) => warn!("Skipping remote task: {}", e),
            }
        }

        let bookmark = self.bookmark.advance_to(started)?;
        Ok((pulled, bookmark))
    }

    /// Incremental pull triggered by a change notification
    async fn pull_for_change(&self) {
        let _permit = self.guard.acquire().await;

        let Some(user) = self.auth.current_user() else {
            debug!("Signed out, ignoring remote change");
            return;
        };
        match self.pull(&user).await {
            Ok((pulled, _)) => debug!("Realtime pull stored {} tasks", pulled),
            Err(e) => warn!("Realtime pull failed: {}", e),
        }
    }
}

/// Drive the realtime stream until it closes
async fn consume_changes(inner: Arc<Inner>, mut stream: ChangeStream) {
    while let Some(event) = stream.next().await {
        match event {
            ChangeEvent::Changed { kind, task_id } => {
                debug!("Remote {:?} on {:?}", kind, task_id);

                // One pull covers every notification already buffered
                let mut closed = None;
                while let Some(next) = stream.try_next() {
                    if let ChangeEvent::Closed { error } = next {
                        closed = Some(error);
                        break;
                    }
                }

                inner.pull_for_change().await;

                if let Some(error) = closed {
                    log_closed(error);
                    return;
                }
            }
            ChangeEvent::Closed { error } => {
                log_closed(error);
                return;
            }
        }
    }
}

fn log_closed(error: Option<String>) {
    match error {
        Some(e) => warn!("Realtime subscription closed: {}", e),
        None => info!("Realtime subscription closed"),
    }
}
