use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::analytics::{parse_period, summarize, IpAnonymizer};
use crate::error::{LinkError, LinkResult};
use crate::models::{AnalyticsSummary, NewAnalyticsEvent};
use crate::storage::{AnalyticsStore, LinkStore};

/// Records click events and computes summaries from the analytics log
pub struct AnalyticsService {
    store: Arc<dyn AnalyticsStore>,
    anonymizer: IpAnonymizer,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self::with_anonymizer(store, IpAnonymizer::default())
    }

    pub fn with_anonymizer(store: Arc<dyn AnalyticsStore>, anonymizer: IpAnonymizer) -> Self {
        Self { store, anonymizer }
    }

    /// Anonymize the source address and persist one event. Returns the event id.
    pub async fn record_event(&self, mut event: NewAnalyticsEvent) -> LinkResult<u64> {
        event.ip_address = self.anonymizer.anonymize(&event.ip_address);
        let id = self.store.save_event(&event).await.map_err(LinkError::Persistence)?;
        debug!(link_id = event.link_id, event_id = id, "Recorded click");
        Ok(id)
    }

    /// Summarize the clicks on `link_id` within `period` of now
    pub async fn retrieve_analytics(&self, link_id: u64, period: &str) -> LinkResult<AnalyticsSummary> {
        self.retrieve_analytics_at(link_id, period, Utc::now().timestamp())
            .await
    }

    /// Same as [`retrieve_analytics`](Self::retrieve_analytics) with an explicit clock
    pub async fn retrieve_analytics_at(
        &self,
        link_id: u64,
        period: &str,
        now: i64,
    ) -> LinkResult<AnalyticsSummary> {
        let lookback = parse_period(period).map_err(|e| LinkError::InvalidPeriod(e.to_string()))?;
        let lookback = i64::try_from(lookback.as_secs()).unwrap_or(i64::MAX);
        let since = now.saturating_sub(lookback);

        let events = self
            .store
            .get_events(link_id, since)
            .await
            .map_err(LinkError::Persistence)?;

        Ok(summarize(link_id, period, &events))
    }

    /// Resolve `short_code` and summarize its clicks, but only for the link's owner
    pub async fn link_analytics(
        &self,
        links: &dyn LinkStore,
        short_code: &str,
        owner_id: u64,
        period: &str,
    ) -> LinkResult<AnalyticsSummary> {
        let link = links
            .get_link_by_code(short_code)
            .await?
            .ok_or(LinkError::LinkNotFound)?;

        if link.owner_id != Some(owner_id) {
            return Err(LinkError::NotOwner);
        }

        self.retrieve_analytics(link.id, period).await
    }
}
