//! On-demand click aggregation
//!
//! Summaries are a pure function of the raw events handed in. Nothing here
//! touches storage, so the same events always produce the same summary.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::models::{AnalyticsEvent, AnalyticsSummary, ClickCount};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar day (UTC) of a Unix timestamp, `None` past chrono's range
fn day_key(clicked_at: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(clicked_at, 0)
        .map(|at| at.format(DATE_FORMAT).to_string())
}

fn sorted_counts(counts: HashMap<String, u64>) -> Vec<ClickCount> {
    let mut out: Vec<ClickCount> = counts
        .into_iter()
        .map(|(key, clicks)| ClickCount { key, clicks })
        .collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

/// Build a summary for `link_id` from the events of one lookback window.
///
/// Unique visitors are distinct anonymized addresses, so visitors sharing
/// a network prefix count once.
pub fn summarize(link_id: u64, period: &str, events: &[AnalyticsEvent]) -> AnalyticsSummary {
    let mut by_date: HashMap<String, u64> = HashMap::new();
    let mut by_device: HashMap<String, u64> = HashMap::new();
    let mut by_browser: HashMap<String, u64> = HashMap::new();
    let mut by_os: HashMap<String, u64> = HashMap::new();
    let mut visitors: HashSet<&str> = HashSet::new();

    for event in events {
        visitors.insert(&event.ip_address);
        match day_key(event.clicked_at) {
            Some(day) => *by_date.entry(day).or_insert(0) += 1,
            None => warn!(
                link_id,
                clicked_at = event.clicked_at,
                "Click timestamp out of range, leaving it out of the daily breakdown"
            ),
        }
        *by_device.entry(event.device_type.clone()).or_insert(0) += 1;
        *by_browser.entry(event.browser.clone()).or_insert(0) += 1;
        *by_os.entry(event.os.clone()).or_insert(0) += 1;
    }

    AnalyticsSummary {
        link_id,
        period: period.to_string(),
        total_clicks: events.len() as u64,
        unique_visitors: visitors.len() as u64,
        clicks_by_date: sorted_counts(by_date),
        clicks_by_device: sorted_counts(by_device),
        clicks_by_browser: sorted_counts(by_browser),
        clicks_by_os: sorted_counts(by_os),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T12:00:00Z
    const MARCH_1: i64 = 1_709_294_400;
    const DAY: i64 = 86_400;

    fn event(ip: &str, device: &str, browser: &str, os: &str, clicked_at: i64) -> AnalyticsEvent {
        AnalyticsEvent {
            id: 0,
            link_id: 1,
            ip_address: ip.to_string(),
            user_agent: String::new(),
            device_type: device.to_string(),
            browser: browser.to_string(),
            os: os.to_string(),
            clicked_at,
        }
    }

    fn count(key: &str, clicks: u64) -> ClickCount {
        ClickCount {
            key: key.to_string(),
            clicks,
        }
    }

    #[test]
    fn test_summary_counts() {
        let events = vec![
            event("1.1.1.0", "Desktop", "Chrome 120", "Windows 10", MARCH_1),
            event("1.1.1.0", "Desktop", "Chrome 120", "Windows 10", MARCH_1 + 60),
            event("2.2.2.0", "Mobile", "Safari 17", "iPhone", MARCH_1 + DAY),
            event("2.2.2.0", "Mobile", "Safari 17", "iPhone", MARCH_1 + DAY),
            event("3.3.3.0", "Bot", "Googlebot", "Unknown", MARCH_1 + 2 * DAY),
        ];

        let summary = summarize(1, "7d", &events);

        assert_eq!(summary.link_id, 1);
        assert_eq!(summary.period, "7d");
        assert_eq!(summary.total_clicks, 5);
        assert_eq!(summary.unique_visitors, 3);
        assert_eq!(
            summary.clicks_by_date,
            vec![count("2024-03-01", 2), count("2024-03-02", 2), count("2024-03-03", 1)]
        );
        assert_eq!(
            summary.clicks_by_device,
            vec![count("Bot", 1), count("Desktop", 2), count("Mobile", 2)]
        );
        assert_eq!(
            summary.clicks_by_browser,
            vec![count("Chrome 120", 2), count("Googlebot", 1), count("Safari 17", 2)]
        );
        assert_eq!(
            summary.clicks_by_os,
            vec![count("Unknown", 1), count("Windows 10", 2), count("iPhone", 2)]
        );
    }

    #[test]
    fn test_breakdowns_sum_to_total() {
        let events: Vec<_> = (0..20)
            .map(|i| {
                let device = if i % 3 == 0 { "Mobile" } else { "Desktop" };
                event(&format!("10.0.{i}.0"), device, "Firefox", "Linux", MARCH_1 + i * 3600)
            })
            .collect();

        let summary = summarize(9, "30d", &events);
        let sum = |counts: &[ClickCount]| counts.iter().map(|c| c.clicks).sum::<u64>();

        assert_eq!(summary.total_clicks, 20);
        assert_eq!(summary.unique_visitors, 20);
        assert_eq!(sum(&summary.clicks_by_date), 20);
        assert_eq!(sum(&summary.clicks_by_device), 20);
        assert_eq!(sum(&summary.clicks_by_browser), 20);
        assert_eq!(sum(&summary.clicks_by_os), 20);
    }

    #[test]
    fn test_empty_events() {
        let summary = summarize(3, "24h", &[]);
        assert_eq!(
            summary,
            AnalyticsSummary {
                link_id: 3,
                period: "24h".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_unrepresentable_timestamp_has_no_date_bucket() {
        let events = vec![
            event("1.1.1.0", "Desktop", "Firefox 120", "Linux", MARCH_1),
            event("2.2.2.0", "Desktop", "Firefox 120", "Linux", i64::MAX),
        ];

        let summary = summarize(1, "30d", &events);

        assert_eq!(summary.total_clicks, 2);
        assert_eq!(summary.unique_visitors, 2);
        assert_eq!(summary.clicks_by_date, vec![count("2024-03-01", 1)]);
        assert!(summary.clicks_by_date.iter().all(|c| c.key != "1970-01-01"));
        assert_eq!(summary.clicks_by_device, vec![count("Desktop", 2)]);
    }
}
