//! Remote service errors

use thiserror::Error;

use crate::models::ModelError;

/// Errors returned by a [`RemoteClient`](super::RemoteClient)
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No session, or the service refused the credentials
    #[error("Not signed in or session expired")]
    Unauthenticated,

    /// Transport failure (DNS, connect, timeout, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-success status
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A fetched row does not describe a valid task
    #[error("Remote task '{id}' is invalid: {source}")]
    InvalidRow {
        id: String,
        #[source]
        source: ModelError,
    },

    /// The response body could not be decoded
    #[error("Failed to decode remote response: {0}")]
    Decode(String),

    /// The realtime channel refused or dropped the subscription
    #[error("Realtime subscription failed: {0}")]
    Subscription(String),

    /// Remote URL or API key missing or malformed
    #[error("Remote service not configured: {0}")]
    NotConfigured(String),
}

impl RemoteError {
    /// Whether the failure happened before the service could answer
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            RemoteError::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            RemoteError::Rejected {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            RemoteError::Network(error.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RemoteError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        RemoteError::Network(error.to_string())
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
