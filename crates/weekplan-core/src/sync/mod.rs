//! Local/remote task synchronization
//!
//! ## Full sync
//!
//! 1. Require a signed-in user
//! 2. Push: upsert a fresh snapshot of every local task
//! 3. Pull: fetch rows updated after the bookmark, overwrite local copies
//! 4. Advance the bookmark
//!
//! At most one full sync runs at a time. Single-task changes travel through
//! a bounded background queue instead, and realtime notifications trigger
//! incremental pulls.
//!
//! ## Usage
//!
//! ```ignore
//! let coordinator = SyncCoordinator::new(store, remote, auth, bookmark, options);
//! coordinator.perform_sync().await?;
//! coordinator.start().await;
//! // ...
//! coordinator.shutdown().await;
//! ```

mod bookmark;
mod coordinator;
mod error;
mod guard;
mod propagation;

pub use bookmark::{SyncBookmark, BOOKMARK_KEY};
pub use coordinator::{SyncCoordinator, SyncOptions, SyncStart, SyncSummary};
pub use error::SyncError;
pub use guard::{SyncGuard, SyncPermit, SyncPhase};
