//! In-memory fakes shared by the sync and repository tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{mpsc, Notify, Semaphore};

use crate::auth::{Session, SessionGate};
use crate::millis;
use crate::models::{Priority, Task};
use crate::remote::{
    ChangeEvent, ChangeKind, ChangeStream, RemoteClient, RemoteError, RemoteResult,
    RemoteTaskRow,
};

pub const USER_ID: &str = "user-1";

/// Calls observed by [`FakeRemote`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Upsert(Vec<String>),
    Select {
        user_id: String,
        updated_after: Option<DateTime<Utc>>,
    },
    Delete {
        id: String,
        user_id: String,
    },
    Subscribe(String),
}

/// Recording in-memory remote table
#[derive(Default)]
pub struct FakeRemote {
    rows: Mutex<BTreeMap<String, RemoteTaskRow>>,
    calls: Mutex<Vec<RemoteCall>>,
    fail_upsert: Mutex<Option<RemoteError>>,
    fail_select: Mutex<Option<RemoteError>>,
    fail_delete: Mutex<Option<RemoteError>>,
    /// Rows another device writes right before our next select
    foreign_writes: Mutex<Vec<RemoteTaskRow>>,
    upsert_gate: Mutex<Option<Arc<Semaphore>>>,
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
    /// Signalled whenever an upsert call begins
    pub upsert_started: Notify,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rows(&self) -> BTreeMap<String, RemoteTaskRow> {
        self.rows.lock().unwrap().clone()
    }

    /// Seed a row without recording a call
    pub fn seed(&self, row: RemoteTaskRow) {
        self.rows.lock().unwrap().insert(row.id.clone(), row);
    }

    pub fn queue_foreign_write(&self, row: RemoteTaskRow) {
        self.foreign_writes.lock().unwrap().push(row);
    }

    pub fn fail_next_upsert(&self, error: RemoteError) {
        *self.fail_upsert.lock().unwrap() = Some(error);
    }

    pub fn fail_next_select(&self, error: RemoteError) {
        *self.fail_select.lock().unwrap() = Some(error);
    }

    pub fn fail_next_delete(&self, error: RemoteError) {
        *self.fail_delete.lock().unwrap() = Some(error);
    }

    /// Block upserts until [`release_upserts`](Self::release_upserts)
    pub fn hold_upserts(&self) {
        *self.upsert_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_upserts(&self) {
        if let Some(gate) = self.upsert_gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Push a change notification to every live subscription
    pub fn emit_change(&self, task_id: &str) {
        let event = ChangeEvent::Changed {
            kind: ChangeKind::Update,
            task_id: Some(task_id.to_string()),
        };
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.try_send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Wait until `count` calls matching `pred` were recorded
    pub async fn wait_for_calls(&self, count: usize, pred: impl Fn(&RemoteCall) -> bool) {
        for _ in 0..200 {
            if self.calls().iter().filter(|c| pred(c)).count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} calls; got {:?}", count, self.calls());
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn upsert_rows(&self, rows: &[RemoteTaskRow]) -> RemoteResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.record(RemoteCall::Upsert(rows.iter().map(|r| r.id.clone()).collect()));
        self.upsert_started.notify_one();

        let gate = self.upsert_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        if let Some(error) = self.fail_upsert.lock().unwrap().take() {
            return Err(error);
        }

        let mut stored = self.rows.lock().unwrap();
        for row in rows {
            stored.insert(row.id.clone(), row.clone());
        }
        Ok(())
    }

    async fn select_rows_for_user(
        &self,
        user_id: &str,
        updated_after: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<RemoteTaskRow>> {
        self.record(RemoteCall::Select {
            user_id: user_id.to_string(),
            updated_after,
        });

        if let Some(error) = self.fail_select.lock().unwrap().take() {
            return Err(error);
        }

        let foreign: Vec<_> = self.foreign_writes.lock().unwrap().drain(..).collect();
        for row in foreign {
            self.seed(row);
        }

        let after = updated_after.map(|t| millis::from_datetime(&t));
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| after.map_or(true, |after| r.updated_at > after))
            .cloned()
            .collect())
    }

    async fn delete_row(&self, id: &str, user_id: &str) -> RemoteResult<()> {
        self.record(RemoteCall::Delete {
            id: id.to_string(),
            user_id: user_id.to_string(),
        });

        if let Some(error) = self.fail_delete.lock().unwrap().take() {
            return Err(error);
        }

        let mut rows = self.rows.lock().unwrap();
        if rows.get(id).is_some_and(|r| r.user_id == user_id) {
            rows.remove(id);
        }
        Ok(())
    }

    async fn subscribe_to_changes(&self, user_id: &str) -> ChangeStream {
        self.record(RemoteCall::Subscribe(user_id.to_string()));
        let (tx, stream) = ChangeStream::channel(16);
        self.subscribers.lock().unwrap().push(tx);
        stream
    }
}

pub fn signed_in() -> Arc<SessionGate> {
    Arc::new(SessionGate::in_memory(Some(
        Session::new(USER_ID, "token").with_email("me@example.com"),
    )))
}

pub fn signed_out() -> Arc<SessionGate> {
    Arc::new(SessionGate::signed_out())
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

/// Task with a fixed `updated_at`, in epoch milliseconds
pub fn task_at(id: &str, title: &str, updated_ms: i64) -> Task {
    let mut task = Task::with_id(id, title, "work", Priority::Medium, day(2));
    task.created_at = millis::to_datetime(updated_ms).unwrap();
    task.updated_at = millis::to_datetime(updated_ms).unwrap();
    task
}

pub fn row_at(id: &str, title: &str, updated_ms: i64) -> RemoteTaskRow {
    RemoteTaskRow::from_task(&task_at(id, title, updated_ms), USER_ID)
}

pub fn is_upsert(call: &RemoteCall) -> bool {
    matches!(call, RemoteCall::Upsert(_))
}

pub fn is_select(call: &RemoteCall) -> bool {
    matches!(call, RemoteCall::Select { .. })
}
