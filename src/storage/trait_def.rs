use crate::models::{AnalyticsEvent, Link, LinkPage, NewAnalyticsEvent};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("link not found")]
    NotFound,
    #[error("link is owned by another user")]
    NotOwner,
    /// The value does not fit the signed 64-bit column it is stored in
    #[error("{field} {value} is out of range")]
    OutOfRange { field: &'static str, value: u64 },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable source of truth for links
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Allocate the next identifier and persist a link under `codec::encode(id)`.
    ///
    /// Allocation, floor rebasing and the insert happen atomically, so
    /// concurrent callers never receive the same identifier.
    async fn save_link(&self, long_url: &str, owner_id: Option<u64>) -> StorageResult<Link>;

    /// Get a link by short code
    async fn get_link_by_code(&self, short_code: &str) -> StorageResult<Option<Link>>;

    /// List an owner's links, newest first, with the owner's total link count
    async fn get_user_links(&self, owner_id: u64, limit: u64, offset: u64)
        -> StorageResult<LinkPage>;

    /// Delete a link and all of its analytics events in one transaction.
    ///
    /// Fails with `NotFound` when the code is unknown and `NotOwner` when the
    /// link does not belong to `owner_id`; nothing is deleted in either case.
    async fn delete_link(&self, short_code: &str, owner_id: u64) -> StorageResult<()>;

    async fn get_total_links(&self) -> StorageResult<u64>;

    /// Total number of recorded clicks across all links
    async fn get_total_requests(&self) -> StorageResult<u64>;
}

/// Append-only click log
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Persist a click event, returning its assigned id
    async fn save_event(&self, event: &NewAnalyticsEvent) -> StorageResult<u64>;

    /// Events for `link_id` clicked at or after `since` (Unix seconds)
    async fn get_events(&self, link_id: u64, since: i64) -> StorageResult<Vec<AnalyticsEvent>>;
}
