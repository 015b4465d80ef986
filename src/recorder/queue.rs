//! Bounded job queue drained by a fixed pool of workers

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{BackgroundJob, DispatchOutcome, OverflowPolicy, RecordingSink};

struct Shared {
    jobs: Mutex<VecDeque<BackgroundJob>>,
    capacity: usize,
    /// Signalled when a job is pushed
    job_ready: Notify,
    /// Signalled when a worker takes a job off the queue
    space_ready: Notify,
    closed: AtomicBool,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<BackgroundJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop(&self) -> Option<BackgroundJob> {
        let job = self.lock().pop_front();
        if job.is_some() {
            self.space_ready.notify_one();
        }
        job
    }
}

/// Recording sink with a bounded FIFO and `workers` concurrent executors
pub struct QueuedSink {
    shared: Arc<Shared>,
    policy: OverflowPolicy,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl QueuedSink {
    /// Spawn the worker pool. Must be called from within a Tokio runtime.
    pub fn new(workers: usize, capacity: usize, policy: OverflowPolicy) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
            job_ready: Notify::new(),
            space_ready: Notify::new(),
            closed: AtomicBool::new(false),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|worker| {
                let shared = Arc::clone(&shared);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(run_worker(worker, shared, shutdown_rx))
            })
            .collect();

        Self {
            shared,
            policy,
            workers: Mutex::new(handles),
            shutdown_tx,
        }
    }

    /// Jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Stop accepting jobs, run everything already queued, and wait for the workers.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(pending = self.pending(), "Shutting down recording sink, draining queue...");

        let _ = self.shutdown_tx.send(true);
        // Wake dispatchers blocked on a full queue so they observe `closed`
        self.shared.space_ready.notify_waiters();

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Recording worker terminated abnormally: {}", e);
            }
        }
        info!("Recording sink drained");
    }

    fn push(&self, job: BackgroundJob) -> Result<DispatchOutcome, BackgroundJob> {
        let mut jobs = self.shared.lock();
        if jobs.len() < self.shared.capacity {
            jobs.push_back(job);
            return Ok(DispatchOutcome::Queued);
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                jobs.pop_front();
                jobs.push_back(job);
                Ok(DispatchOutcome::Displaced)
            }
            OverflowPolicy::DropNewest => Ok(DispatchOutcome::Dropped),
            OverflowPolicy::Block => Err(job),
        }
    }
}

#[async_trait]
impl RecordingSink for QueuedSink {
    async fn dispatch(&self, job: BackgroundJob) -> DispatchOutcome {
        let mut job = job;
        let outcome = loop {
            if self.shared.closed.load(Ordering::Acquire) {
                warn!("Recording sink is shut down, dropping job");
                return DispatchOutcome::Dropped;
            }

            // Register before checking so a concurrent pop cannot be missed
            let space = self.shared.space_ready.notified();
            match self.push(job) {
                Ok(outcome) => break outcome,
                Err(rejected) => {
                    job = rejected;
                    space.await;
                }
            }
        };

        match outcome {
            DispatchOutcome::Dropped => {
                warn!(capacity = self.shared.capacity, "Recording queue full, dropping newest job");
            }
            DispatchOutcome::Displaced => {
                warn!(capacity = self.shared.capacity, "Recording queue full, discarded oldest job");
                self.shared.job_ready.notify_one();
            }
            DispatchOutcome::Queued => self.shared.job_ready.notify_one(),
        }
        outcome
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_worker(
    worker: usize,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut stopping = false;
    loop {
        if let Some(job) = shared.pop() {
            // Run on its own task so a panicking job cannot take the worker down
            if let Err(e) = tokio::spawn(job).await {
                error!(worker, "Background job failed: {}", e);
            }
            continue;
        }

        if stopping || *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = shared.job_ready.notified() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    stopping = true;
                }
            }
        }
    }
    debug!(worker, "Recording worker stopped");
}
