//! Single-flight guard for full syncs
//!
//! At most one permit exists at a time. The phase returns to `Idle` when the
//! permit is dropped, whether the holder finished, failed or panicked.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, OwnedMutexGuard};

/// Full-sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
}

/// Mutual exclusion for sync bodies
#[derive(Debug)]
pub struct SyncGuard {
    lock: Arc<Mutex<()>>,
    phase: Arc<watch::Sender<SyncPhase>>,
}

/// Proof of holding the guard
#[derive(Debug)]
pub struct SyncPermit {
    _lock: OwnedMutexGuard<()>,
    phase: Arc<watch::Sender<SyncPhase>>,
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGuard {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            lock: Arc::new(Mutex::new(())),
            phase: Arc::new(phase),
        }
    }

    /// Take the guard if free, without waiting
    pub fn try_acquire(&self) -> Option<SyncPermit> {
        let lock = Arc::clone(&self.lock).try_lock_owned().ok()?;
        Some(self.permit(lock))
    }

    /// Wait until the guard is free, then take it
    pub async fn acquire(&self) -> SyncPermit {
        let lock = Arc::clone(&self.lock).lock_owned().await;
        self.permit(lock)
    }

    fn permit(&self, lock: OwnedMutexGuard<()>) -> SyncPermit {
        self.phase.send_replace(SyncPhase::Syncing);
        SyncPermit {
            _lock: lock,
            phase: Arc::clone(&self.phase),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn is_syncing(&self) -> bool {
        self.phase() == SyncPhase::Syncing
    }

    /// Observe phase changes
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.phase.send_replace(SyncPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_single_permit() {
        let guard = SyncGuard::new();
        assert_eq!(guard.phase(), SyncPhase::Idle);

        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_syncing());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert_eq!(guard.phase(), SyncPhase::Idle);
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let guard = Arc::new(SyncGuard::new());
        let permit = guard.try_acquire().unwrap();

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                let _permit = guard.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_when_holder_panics() {
        let guard = Arc::new(SyncGuard::new());
        let permit = guard.try_acquire().unwrap();

        let result = tokio::spawn(async move {
            let _permit = permit;
            panic!("sync body failed");
        })
        .await;

        assert!(result.is_err());
        assert_eq!(guard.phase(), SyncPhase::Idle);
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_subscribers_see_phase_changes() {
        let guard = SyncGuard::new();
        let mut rx = guard.subscribe();

        let permit = guard.try_acquire().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SyncPhase::Syncing);

        drop(permit);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SyncPhase::Idle);
    }
}
