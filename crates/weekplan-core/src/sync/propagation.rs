//! Background propagation of single-task changes
//!
//! Mutations are handed to a bounded queue owned by the coordinator. One
//! worker drains it, running up to `workers` remote calls at a time. Closing
//! the queue lets the worker finish everything already queued or in flight.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::auth::AuthGate;
use crate::models::Task;
use crate::remote::{RemoteClient, RemoteTaskRow};

/// One unit of propagation work
#[derive(Debug, Clone)]
pub(crate) enum Job {
    Upsert(Task),
    Delete(String),
}

impl Job {
    fn task_id(&self) -> &str {
        match self {
            Job::Upsert(task) => &task.id,
            Job::Delete(id) => id,
        }
    }
}

/// Handle to the propagation queue and its worker
pub(crate) struct Propagator {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Propagator {
    /// Start the worker on the current runtime
    pub(crate) fn spawn(
        remote: Arc<dyn RemoteClient>,
        auth: Arc<dyn AuthGate>,
        capacity: usize,
        workers: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(rx, remote, auth, workers.max(1)));

        Self {
            tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Queue a job without waiting; returns whether it was accepted
    pub(crate) fn enqueue(&self, job: Job) -> bool {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = tx.as_ref() else {
            debug!("Propagation closed, dropping change for {}", job.task_id());
            return false;
        };

        match tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    "Propagation queue full, dropping change for {}; next full sync will push it",
                    job.task_id()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                debug!("Propagation worker gone, dropping change for {}", job.task_id());
                false
            }
        }
    }

    /// Stop accepting jobs and wait for queued and in-flight ones to finish
    pub(crate) async fn close_and_drain(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Propagation worker failed: {}", e);
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    remote: Arc<dyn RemoteClient>,
    auth: Arc<dyn AuthGate>,
    workers: usize,
) {
    let limit = Arc::new(Semaphore::new(workers));
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = result {
                    warn!("Propagation task failed: {}", e);
                }
            }
            job = rx.recv() => {
                let Some(job) = job else { break };
                let Ok(permit) = Arc::clone(&limit).acquire_owned().await else { break };
                let remote = Arc::clone(&remote);
                let auth = Arc::clone(&auth);
                in_flight.spawn(async move {
                    let _permit = permit;
                    execute(job, remote.as_ref(), auth.as_ref()).await;
                });
            }
        }
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            warn!("Propagation task failed: {}", e);
        }
    }
    debug!("Propagation worker drained");
}

/// Run one job; failures are logged and swallowed
async fn execute(job: Job, remote: &dyn RemoteClient, auth: &dyn AuthGate) {
    // The session may have ended since the job was queued
    let Some(user) = auth.current_user() else {
        debug!("Not signed in, skipping propagation for {}", job.task_id());
        return;
    };

    match job {
        Job::Upsert(task) => {
            let row = RemoteTaskRow::from_task(&task, &user.id);
            match remote.upsert_rows(std::slice::from_ref(&row)).await {
                Ok(()) => debug!("Pushed task {}", task.id),
                Err(e) => warn!("Failed to push task {}: {}", task.id, e),
            }
        }
        Job::Delete(id) => match remote.delete_row(&id, &user.id).await {
            Ok(()) => debug!("Deleted remote task {}", id),
            Err(e) => warn!("Failed to delete remote task {}: {}", id, e),
        },
    }
}
