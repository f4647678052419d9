//! Sync bookmark persistence
//!
//! Remembers when the last successful pull completed so the next pull only
//! asks for rows changed since then. Stored in `sync_state.json`, a small
//! JSON key-value file kept apart from task data.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::millis;
use crate::storage::files::{atomic_write, read_optional};
use crate::storage::{StorageError, StorageResult};

/// Key of the bookmark inside the state file
pub const BOOKMARK_KEY: &str = "last_sync_timestamp";

/// Persistent, monotonic "last synced" timestamp
#[derive(Debug, Default)]
pub struct SyncBookmark {
    /// Path to persist state
    path: Option<PathBuf>,
    /// Current value, `None` before the first successful sync
    value: Mutex<Option<DateTime<Utc>>>,
}

impl SyncBookmark {
    /// Create a bookmark held only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the bookmark stored under the configured data dir
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::with_path(config.sync_state_path())
    }

    /// Create a bookmark that persists to `path`
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        let state = load_state(&path)?;
        let value = state
            .get(BOOKMARK_KEY)
            .and_then(Value::as_i64)
            .filter(|ms| *ms > 0)
            .and_then(millis::to_datetime);

        Ok(Self {
            path: Some(path),
            value: Mutex::new(value),
        })
    }

    /// Last successful sync, `None` if never synced
    pub fn get(&self) -> Option<DateTime<Utc>> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move the bookmark forward to `at`
    ///
    /// Never moves backwards. The file is written before the in-memory value
    /// changes, so a failed write leaves both untouched. Returns the stored value.
    pub fn advance_to(&self, at: DateTime<Utc>) -> StorageResult<DateTime<Utc>> {
        let mut value = self.value.lock().unwrap_or_else(|e| e.into_inner());

        let next = match *value {
            Some(current) if current >= at => return Ok(current),
            _ => millis::truncate(at),
        };

        if let Some(path) = &self.path {
            let mut state = load_state(path)?;
            state.insert(
                BOOKMARK_KEY.to_string(),
                Value::from(millis::from_datetime(&next)),
            );
            let json = serde_json::to_vec_pretty(&state).map_err(|e| {
                StorageError::InvalidFormat {
                    path: path.clone(),
                    details: e.to_string(),
                }
            })?;
            atomic_write(path, &json)?;
        }

        debug!("Sync bookmark advanced to {}", next);
        *value = Some(next);
        Ok(next)
    }
}

fn load_state(path: &Path) -> StorageResult<Map<String, Value>> {
    match read_optional(path)? {
        Some(json) => serde_json::from_str(&json).map_err(|e| StorageError::InvalidFormat {
            path: path.to_path_buf(),
            details: e.to_string(),
        }),
        None => Ok(Map::new()),
    }
}
