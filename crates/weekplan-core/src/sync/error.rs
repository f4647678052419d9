//! Sync errors

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Why a sync did not complete
#[derive(Error, Debug)]
pub enum SyncError {
    /// No signed-in user; nothing was sent
    #[error("Sync requires a signed-in user")]
    AuthRequired,

    /// The remote service could not be reached
    #[error("Network unavailable: {0}")]
    Network(#[source] RemoteError),

    /// The remote service refused the request or sent bad data
    #[error("Remote error: {0}")]
    Remote(#[source] RemoteError),

    /// Reading or writing the local store failed
    #[error("Local store error: {0}")]
    LocalStore(#[from] StorageError),

    /// Another full sync holds the guard
    #[error("A sync is already in progress")]
    AlreadyRunning,
}

impl From<RemoteError> for SyncError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Unauthenticated => SyncError::AuthRequired,
            RemoteError::Network(_) => SyncError::Network(error),
            other => SyncError::Remote(other),
        }
    }
}

impl SyncError {
    /// Whether retrying later may succeed without user action
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::AlreadyRunning)
    }
}
