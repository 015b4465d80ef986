//! Ephemeral short-code lookup cache
//!
//! Entries are disposable, time-bounded copies of durable store state.
//! Callers on the read path treat any `CacheError` as a miss.

pub mod memory;

pub use memory::MemoryCache;

use crate::models::Link;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Default lifetime of a populated entry
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LinkCache: Send + Sync {
    async fn get(&self, short_code: &str) -> Result<Option<Link>, CacheError>;

    /// Insert or replace an entry; the entry expires `ttl` after this call
    async fn set(&self, short_code: &str, link: &Link, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, short_code: &str) -> Result<(), CacheError>;
}
