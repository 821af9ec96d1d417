//! Bounded background work queue.
//!
//! Post-response work (persisting call logs, broadcasting, firing callbacks)
//! is handed to a [`TaskQueue`] so the client never waits on it. The queue is
//! bounded; when it is full the task is dropped and counted as rejected.
//! Each queue is a named lane with its own worker and concurrency limit.

use crate::config::QueueConfig;
use crate::metrics;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

struct QueuedTask {
    name: &'static str,
    future: BoxFuture<'static, ()>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BackgroundError {
    #[error("background queue is full")]
    QueueFull,
    #[error("background queue is shut down")]
    ShutDown,
}

pub struct TaskQueue {
    lane: &'static str,
    sender: Mutex<Option<mpsc::Sender<QueuedTask>>>,
    receiver: Mutex<Option<mpsc::Receiver<QueuedTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    queue_size: usize,
    max_concurrency: usize,
}

impl TaskQueue {
    /// Create the queue. Tasks submitted before [`TaskQueue::start`] wait in
    /// the channel.
    pub fn new(lane: &'static str, config: &QueueConfig) -> Self {
        let queue_size = config.queue_size.max(1);
        let (tx, rx) = mpsc::channel(queue_size);
        Self {
            lane,
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            queue_size,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Spawn the worker on the current tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) {
        let Some(rx) = self.receiver.lock().take() else {
            return;
        };
        info!(
            "Starting background queue '{}' (capacity {}, concurrency {})",
            self.lane, self.queue_size, self.max_concurrency
        );
        *self.worker.lock() = Some(tokio::spawn(run_worker(
            self.lane,
            rx,
            self.max_concurrency,
        )));
    }

    /// Enqueue a task without waiting.
    pub fn submit<F>(&self, name: &'static str, future: F) -> Result<(), BackgroundError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            metrics::record_background_task(self.lane, "rejected");
            return Err(BackgroundError::ShutDown);
        };

        let task = QueuedTask {
            name,
            future: future.boxed(),
        };
        match sender.try_send(task) {
            Ok(()) => {
                metrics::record_background_task(self.lane, "queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!("Background queue '{}' full, dropping task '{}'", self.lane, task.name);
                metrics::record_background_task(self.lane, "rejected");
                Err(BackgroundError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                warn!("Background queue '{}' closed, dropping task '{}'", self.lane, task.name);
                metrics::record_background_task(self.lane, "rejected");
                Err(BackgroundError::ShutDown)
            }
        }
    }

    /// Number of tasks waiting to be picked up by the worker.
    pub fn pending(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map(|s| self.queue_size - s.capacity())
            .unwrap_or(0)
    }

    /// Stop accepting work and wait up to `grace` for queued and running tasks.
    pub async fn shutdown(&self, grace: Duration) {
        drop(self.sender.lock().take());
        drop(self.receiver.lock().take());
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };

        info!("Draining background queue '{}'", self.lane);
        match tokio::time::timeout(grace, worker).await {
            Ok(_) => info!("Background queue '{}' drained", self.lane),
            Err(_) => warn!(
                "Background queue '{}' did not drain within {:?}",
                self.lane, grace
            ),
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

async fn run_worker(lane: &'static str, mut rx: mpsc::Receiver<QueuedTask>, max_concurrency: usize) {
    let permits = Arc::new(Semaphore::new(max_concurrency));
    let mut running = JoinSet::new();

    while let Some(task) = rx.recv().await {
        while let Some(result) = running.try_join_next() {
            record_outcome(lane, result);
        }

        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        debug!("Running background task '{}' on '{}'", task.name, lane);
        running.spawn(async move {
            task.future.await;
            drop(permit);
        });
    }

    while let Some(result) = running.join_next().await {
        record_outcome(lane, result);
    }
    debug!("Background worker '{}' stopped", lane);
}

fn record_outcome(lane: &'static str, result: Result<(), JoinError>) {
    match result {
        Ok(()) => metrics::record_background_task(lane, "completed"),
        Err(e) if e.is_panic() => {
            warn!("Background task on '{}' panicked", lane);
            metrics::record_background_task(lane, "panicked");
        }
        Err(_) => metrics::record_background_task(lane, "cancelled"),
    }
}
