//! weekplan Core Library
//!
//! This crate provides the core functionality for weekplan, an offline-first
//! weekly task planner that keeps a local SQLite store in sync with a cloud
//! task table.
//!
//! # Architecture
//!
//! - **Local store**: SQLite is the system of record on the device
//! - **Remote**: REST for push/pull, a realtime websocket for change notices
//! - **Sync coordinator**: push-then-pull full syncs, background propagation
//!
//! Reads are always served locally; the network is never on the path of a
//! user-facing mutation.
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(SqliteTaskStore::open(&config)?);
//! let repo = TaskRepository::new(store);
//!
//! // Add a task
//! let task = Task::new("Plan week", "personal", Priority::Medium, today);
//! repo.insert(&task).await?;
//!
//! // Query tasks
//! let tasks = repo.by_date(today).await?;
//! ```
//!
//! # Modules
//!
//! - `repository`: Task access (main entry point)
//! - `models`: Task, Priority and statistics shapes
//! - `storage`: Local task store
//! - `remote`: Remote task table client
//! - `auth`: Signed-in user and access token
//! - `sync`: Sync coordinator, bookmark and guard
//! - `config`: Application configuration

pub mod auth;
pub mod config;
pub mod millis;
pub mod models;
pub mod remote;
pub mod repository;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use auth::{AuthGate, Session, SessionGate, User};
pub use config::Config;
pub use models::{CategoryCount, ModelError, Priority, Task, TaskStats};
pub use remote::{HttpRemote, RemoteClient, RemoteError, RemoteTaskRow};
pub use repository::TaskRepository;
pub use storage::{LocalStore, SqliteTaskStore, StorageError};
pub use sync::{SyncBookmark, SyncCoordinator, SyncError, SyncOptions, SyncStart, SyncSummary};
