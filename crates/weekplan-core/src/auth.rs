//! Authentication state
//!
//! The sync layer only consumes authentication: it asks whether a user is
//! signed in, who they are, and which bearer token to present. Obtaining a
//! token (sign-up, sign-in, password reset) happens elsewhere; the CLI just
//! stores one.

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::storage::files::{atomic_write, read_optional, remove_if_exists};
use crate::storage::{StorageError, StorageResult};

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

/// Read-only view of the current authentication state
pub trait AuthGate: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// Bearer token for remote requests
    fn access_token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

/// A stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            access_token: access_token.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    fn user(&self) -> User {
        User {
            id: self.user_id.clone(),
            email: self.email.clone(),
        }
    }
}

/// Session-backed [`AuthGate`], optionally persisted to `session.json`
#[derive(Debug)]
pub struct SessionGate {
    path: Option<PathBuf>,
    session: RwLock<Option<Session>>,
}

impl SessionGate {
    /// Load the session stored under the configured data dir
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::with_path(config.session_path())
    }

    /// Load a session file; a missing file means signed out
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        let session = match read_optional(&path)? {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                StorageError::InvalidFormat {
                    path: path.clone(),
                    details: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            path: Some(path),
            session: RwLock::new(session),
        })
    }

    /// Session held only in memory
    pub fn in_memory(session: Option<Session>) -> Self {
        Self {
            path: None,
            session: RwLock::new(session),
        }
    }

    /// Signed-out gate (for testing and sync-less setups)
    pub fn signed_out() -> Self {
        Self::in_memory(None)
    }

    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the current session and persist it
    pub fn set_session(&self, session: Session) -> StorageResult<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(&session).map_err(|e| {
                StorageError::InvalidFormat {
                    path: path.clone(),
                    details: e.to_string(),
                }
            })?;
            atomic_write(path, &json)?;
        }

        debug!("Stored session for user {}", session.user_id);
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        Ok(())
    }

    /// Sign out, removing any persisted session
    pub fn clear(&self) -> StorageResult<()> {
        if let Some(path) = &self.path {
            remove_if_exists(path)?;
        }
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

impl AuthGate for SessionGate {
    fn current_user(&self) -> Option<User> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Session::user)
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}
