use crate::cache::CacheError;
use crate::codec::CodecError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced to callers of the link and analytics services
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid URL")]
    InvalidUrl,
    #[error("invalid URL scheme {0:?}, only http and https are allowed")]
    InvalidScheme(String),
    #[error("invalid URL host")]
    InvalidHost,
    #[error("link not found")]
    LinkNotFound,
    #[error("link is owned by another user")]
    NotOwner,
    #[error("invalid period: {0}")]
    InvalidPeriod(String),
    #[error("invalid short code: {0}")]
    InvalidCode(#[from] CodecError),
    #[error("persistence failure: {0}")]
    Persistence(#[source] StorageError),
    /// The link was deleted from the store but its cache entry could not be removed
    #[error("link deleted but cache invalidation failed: {0}")]
    CacheInvalidation(#[source] CacheError),
}

impl From<StorageError> for LinkError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => LinkError::LinkNotFound,
            StorageError::NotOwner => LinkError::NotOwner,
            other => LinkError::Persistence(other),
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;
