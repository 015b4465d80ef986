//! Click event and summary models

use serde::{Deserialize, Serialize};

/// A persisted click on a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: u64,
    pub link_id: u64,
    /// Anonymized source address
    pub ip_address: String,
    pub user_agent: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    /// Unix timestamp (seconds)
    pub clicked_at: i64,
}

/// A click event before the analytics store has assigned it an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnalyticsEvent {
    pub link_id: u64,
    pub ip_address: String,
    pub user_agent: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub clicked_at: i64,
}

/// Count of clicks for a single breakdown key (date, device, browser or OS)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClickCount {
    pub key: String,
    pub clicks: u64,
}

/// Click summary for one link over a lookback period. Never persisted.
///
/// Breakdowns are emitted sorted by key so output is stable, but consumers
/// should treat them as unordered collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub link_id: u64,
    pub period: String,
    pub total_clicks: u64,
    pub unique_visitors: u64,
    pub clicks_by_date: Vec<ClickCount>,
    pub clicks_by_device: Vec<ClickCount>,
    pub clicks_by_browser: Vec<ClickCount>,
    pub clicks_by_os: Vec<ClickCount>,
}
