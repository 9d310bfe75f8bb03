//! Bounded job buffer between the consume loop and the worker pool.
//!
//! One `JobSender` feeds any number of `JobReceiver` clones. Closing the
//! sender lets receivers drain whatever is still buffered before they see the
//! end of the queue.

use crate::jobs::types::Job;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 100;

/// Enqueue failure. The job is handed back so the caller can decide its fate.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("enqueue cancelled")]
    Cancelled(Job),
    #[error("job queue closed")]
    Closed(Job),
}

impl EnqueueError {
    pub fn into_job(self) -> Job {
        match self {
            EnqueueError::Cancelled(job) | EnqueueError::Closed(job) => job,
        }
    }
}

pub struct JobQueue;

impl JobQueue {
    pub fn bounded(capacity: usize) -> (JobSender, JobReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        (
            JobSender {
                tx,
                depth: depth.clone(),
                capacity,
            },
            JobReceiver {
                rx: Arc::new(Mutex::new(rx)),
                depth,
            },
        )
    }
}

/// Producing half. Deliberately not `Clone`: dropping it is what closes the queue.
pub struct JobSender {
    tx: mpsc::Sender<Job>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl JobSender {
    /// Wait for room and enqueue. A full queue blocks here, which is what
    /// throttles the consume loop when workers fall behind.
    pub async fn enqueue(&self, job: Job, cancel: &CancellationToken) -> Result<(), EnqueueError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EnqueueError::Cancelled(job)),
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    self.depth.fetch_add(1, Ordering::SeqCst);
                    permit.send(job);
                    Ok(())
                }
                Err(_) => Err(EnqueueError::Closed(job)),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// No more jobs will be enqueued. Already buffered jobs are still delivered.
    pub fn close_and_drain(self) {
        drop(self);
    }
}

#[derive(Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    depth: Arc<AtomicUsize>,
}

impl JobReceiver {
    /// Next job, or `None` once the queue is closed and empty or `cancel` fires
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<Job> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            job = async { self.rx.lock().await.recv().await } => {
                if job.is_some() {
                    self.depth.fetch_sub(1, Ordering::SeqCst);
                }
                job
            }
        }
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
