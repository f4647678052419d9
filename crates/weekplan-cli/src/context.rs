//! Wiring of store, session and sync coordinator for one CLI invocation

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use weekplan_core::{
    AuthGate, Config, HttpRemote, LocalStore, SessionGate, SqliteTaskStore, SyncBookmark,
    SyncCoordinator, SyncOptions, TaskRepository,
};

/// Everything a command needs, opened from the configuration
pub struct AppContext {
    pub config: Config,
    pub store: SqliteTaskStore,
    pub session: Arc<SessionGate>,
    pub repo: TaskRepository,
}

impl AppContext {
    /// Open the local store and attach a coordinator when sync is configured
    ///
    /// Must be called inside a tokio runtime.
    pub fn open(config: Config) -> Result<Self> {
        let store = SqliteTaskStore::open(&config).context("Failed to open task database")?;
        let session = Arc::new(SessionGate::open(&config).context("Failed to load session")?);

        let local: Arc<dyn LocalStore> = Arc::new(store.clone());
        let mut repo = TaskRepository::new(Arc::clone(&local));

        if config.sync_configured() {
            let auth: Arc<dyn AuthGate> = session.clone();
            let remote = HttpRemote::new(&config, Arc::clone(&auth))
                .context("Failed to configure remote")?;
            let bookmark = SyncBookmark::open(&config).context("Failed to load sync state")?;
            let coordinator = SyncCoordinator::new(
                local,
                Arc::new(remote),
                auth,
                bookmark,
                SyncOptions::from_config(&config),
            );
            repo = repo.with_sync(coordinator);
        } else {
            debug!("Sync not configured, running local-only");
        }

        Ok(Self {
            config,
            store,
            session,
            repo,
        })
    }

    pub fn coordinator(&self) -> Option<&SyncCoordinator> {
        self.repo.sync()
    }

    /// Stop background sync work and drain pending propagation
    pub async fn shutdown(&self) {
        if let Some(coordinator) = self.coordinator() {
            coordinator.shutdown().await;
        }
    }
}
