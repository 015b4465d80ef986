//! Database row shapes shared by the sqlx backends.
//!
//! Both SQLite and Postgres store identifiers as signed 64-bit integers.

use crate::models::{AnalyticsEvent, Link};
use crate::storage::{StorageError, StorageResult};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub(crate) struct LinkRow {
    pub id: i64,
    pub short_code: String,
    pub long_url: String,
    pub owner_id: Option<i64>,
    pub created_at: i64,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Self {
            id: row.id as u64,
            short_code: row.short_code,
            long_url: row.long_url,
            owner_id: row.owner_id.map(|id| id as u64),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub id: i64,
    pub link_id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub clicked_at: i64,
}

impl From<EventRow> for AnalyticsEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id as u64,
            link_id: row.link_id as u64,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            device_type: row.device_type,
            browser: row.browser,
            os: row.os,
            clicked_at: row.clicked_at,
        }
    }
}

/// Convert an identifier for a signed column. Values above `i64::MAX` are
/// rejected; clamping would make distinct identifiers compare equal.
pub(crate) fn to_db_int(field: &'static str, value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::OutOfRange { field, value })
}

/// Pagination bounds only: anything past `i64::MAX` means "all rows"
pub(crate) fn clamp_db_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
