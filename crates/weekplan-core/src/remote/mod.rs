//! Remote task service
//!
//! The cloud copy of each user's tasks, reached over a PostgREST-style HTTP
//! API plus a Phoenix realtime websocket for change notifications.
//!
//! ## Usage
//!
//! ```ignore
//! let remote = HttpRemote::new(&config, auth.clone())?;
//! remote.upsert_rows(&rows).await?;
//! let mut changes = remote.subscribe_to_changes(&user.id).await;
//! while let Some(event) = changes.next().await { /* ... */ }
//! ```

mod error;
mod http;
mod message;
mod realtime;
mod row;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use error::{RemoteError, RemoteResult};
pub use http::HttpRemote;
pub use row::RemoteTaskRow;

/// Kind of row change reported by the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Events delivered on a [`ChangeStream`]
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A task row for the subscribed user changed remotely
    Changed {
        kind: ChangeKind,
        task_id: Option<String>,
    },
    /// The subscription ended; always the last event
    Closed { error: Option<String> },
}

/// Stream of remote change notifications
///
/// Dropping the stream tears down the underlying connection.
#[derive(Debug)]
pub struct ChangeStream {
    rx: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChangeStream {
    /// Stream fed through the returned sender
    pub fn channel(capacity: usize) -> (mpsc::Sender<ChangeEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx, task: None })
    }

    /// Stream that only reports a failed subscription
    pub fn closed(error: impl Into<String>) -> Self {
        let (tx, stream) = Self::channel(1);
        // Capacity 1 and a fresh channel: cannot be full
        let _ = tx.try_send(ChangeEvent::Closed {
            error: Some(error.into()),
        });
        stream
    }

    /// Tie a background task's lifetime to this stream
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Next event, `None` once the producer is gone
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already buffered
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Client for the remote `tasks` table
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Insert or update rows keyed by `id`
    ///
    /// Idempotent. An empty slice performs no I/O.
    async fn upsert_rows(&self, rows: &[RemoteTaskRow]) -> RemoteResult<()>;

    /// All rows for the user, optionally only those updated after a moment
    async fn select_rows_for_user(
        &self,
        user_id: &str,
        updated_after: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<RemoteTaskRow>>;

    /// Delete one of the user's rows
    async fn delete_row(&self, id: &str, user_id: &str) -> RemoteResult<()>;

    /// Subscribe to changes of the user's rows
    ///
    /// Never fails directly: connection and subscription errors arrive as a
    /// terminal [`ChangeEvent::Closed`].
    async fn subscribe_to_changes(&self, user_id: &str) -> ChangeStream;
}
