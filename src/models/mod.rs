mod analytics;
mod link;

pub use analytics::{AnalyticsEvent, AnalyticsSummary, ClickCount, NewAnalyticsEvent};
pub use link::{GlobalStats, Link, LinkPage};
