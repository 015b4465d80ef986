//! Click analytics
//!
//! Click context derivation happens on the request path (user-agent
//! classification only). Address anonymization and persistence happen in
//! [`AnalyticsService::record_event`], off the request path. Summaries are
//! computed on demand from raw events and never cached.

pub mod aggregator;
pub mod client;
pub mod period;
pub mod service;

pub use aggregator::summarize;
pub use client::{classify_user_agent, ClickContext, IpAnonymizer, UserAgentInfo};
pub use period::{parse_period, PeriodError};
pub use service::AnalyticsService;

/// Lookback used when the caller does not name a period
pub const DEFAULT_PERIOD: &str = "30d";
