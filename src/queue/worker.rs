//! Fixed-size worker pool draining the submission queue.
//!
//! One worker task per encode slot pulls task ids off a bounded channel and
//! runs them through the pipeline. The channel bound puts back-pressure on
//! submissions; a full buffer refuses new work instead of growing without
//! limit.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::admission::AdmissionController;
use super::registry::{TaskRegistry, TaskState};
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;

pub struct WorkerPool {
    tx: mpsc::Sender<Uuid>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn `workers` worker tasks sharing one bounded queue.
    pub fn spawn(
        workers: usize,
        queue_capacity: usize,
        pipeline: Arc<Pipeline>,
        admission: Arc<AdmissionController>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Uuid>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let pipeline = Arc::clone(&pipeline);
                let admission = Arc::clone(&admission);
                let registry = Arc::clone(&registry);
                let token = shutdown.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, rx, pipeline, admission, registry, token).await;
                })
            })
            .collect();

        Self {
            tx,
            handles: parking_lot::Mutex::new(handles),
            shutdown,
        }
    }

    /// Hand a queued task to the pool without waiting.
    pub fn submit(&self, task_id: Uuid) -> Result<()> {
        self.tx.try_send(task_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                Error::Internal("worker pool is shut down".into())
            }
        })
    }

    /// Stop accepting work and wait for in-flight tasks to wind down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Uuid>>>,
    pipeline: Arc<Pipeline>,
    admission: Arc<AdmissionController>,
    registry: Arc<TaskRegistry>,
    token: CancellationToken,
) {
    tracing::debug!(worker_id, "worker started");
    loop {
        let task_id = tokio::select! {
            _ = token.cancelled() => break,
            id = async {
                let mut rx = rx.lock().await;
                rx.recv().await
            } => match id {
                Some(id) => id,
                None => break,
            },
        };

        let span = tracing::info_span!("task", id = %task_id, worker_id);

        let guard = admission.acquire();
        registry.update(task_id, |t| {
            t.state = TaskState::Running;
            t.queue_position = 0;
            t.message = "Video conversion in progress".into();
        });
        registry.recompute_positions(admission.slots_free());

        tokio::select! {
            _ = token.cancelled() => {
                registry.update(task_id, |t| {
                    t.state = TaskState::Failed;
                    t.message = "Cancelled during shutdown".into();
                });
                drop(guard);
                break;
            }
            _ = pipeline.run(task_id).instrument(span) => {}
        }

        drop(guard);
    }
    tracing::debug!(worker_id, "worker stopped");
}
