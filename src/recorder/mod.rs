//! Off-request-path execution of redirect side effects
//!
//! Cache population and click recording run as jobs handed to a
//! [`RecordingSink`]. Jobs are never tied to the caller's lifetime: once
//! dispatched they run to completion even if the caller is dropped.

pub mod queue;

pub use queue::QueuedSink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A detached unit of background work
pub type BackgroundJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// What happened to a dispatched job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted for execution
    Queued,
    /// Rejected; the job will never run
    Dropped,
    /// Accepted, and the oldest pending job was discarded to make room
    Displaced,
}

/// What a bounded sink does when its queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for a free slot (backpressure onto the dispatcher)
    Block,
    /// Reject the incoming job
    DropNewest,
    /// Discard the oldest pending job and accept the incoming one
    DropOldest,
}

#[async_trait]
pub trait RecordingSink: Send + Sync {
    async fn dispatch(&self, job: BackgroundJob) -> DispatchOutcome;
}

/// Unbounded sink: one spawned task per job, no backpressure
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSink;

#[async_trait]
impl RecordingSink for DetachedSink {
    async fn dispatch(&self, job: BackgroundJob) -> DispatchOutcome {
        tokio::spawn(job);
        DispatchOutcome::Queued
    }
}
