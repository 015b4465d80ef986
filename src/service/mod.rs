//! Link resolution: shorten, redirect, list and delete
//!
//! Reads go cache-first and fall back to the durable store. Cache failures
//! on the read path are logged and treated as misses. Cache population and
//! click recording after a redirect are handed to a [`RecordingSink`] and
//! never reported back to the caller.

pub mod validate;

pub use validate::validate_url;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::analytics::{AnalyticsService, ClickContext};
use crate::cache::{CacheError, LinkCache, DEFAULT_CACHE_TTL};
use crate::codec;
use crate::error::{LinkError, LinkResult};
use crate::models::{AnalyticsSummary, GlobalStats, Link, LinkPage};
use crate::recorder::{BackgroundJob, DispatchOutcome, RecordingSink};
use crate::storage::LinkStore;

/// How cache entries age
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTtlPolicy {
    /// TTL is set when an entry is populated after a miss and never extended
    #[default]
    Fixed,
    /// Every hit re-populates the entry with a fresh TTL
    Sliding,
}

#[derive(Debug, Clone)]
pub struct LinkServiceConfig {
    pub cache_ttl: Duration,
    pub ttl_policy: CacheTtlPolicy,
    /// Upper bound on a cache read before it is abandoned as a miss
    pub cache_lookup_timeout: Option<Duration>,
}

impl Default for LinkServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            ttl_policy: CacheTtlPolicy::Fixed,
            cache_lookup_timeout: Some(Duration::from_millis(50)),
        }
    }
}

pub struct LinkService {
    store: Arc<dyn LinkStore>,
    cache: Arc<dyn LinkCache>,
    analytics: Arc<AnalyticsService>,
    sink: Arc<dyn RecordingSink>,
    config: LinkServiceConfig,
}

impl LinkService {
    pub fn new(
        store: Arc<dyn LinkStore>,
        cache: Arc<dyn LinkCache>,
        analytics: Arc<AnalyticsService>,
        sink: Arc<dyn RecordingSink>,
    ) -> Self {
        Self {
            store,
            cache,
            analytics,
            sink,
            config: LinkServiceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LinkServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LinkServiceConfig {
        &self.config
    }

    pub fn analytics(&self) -> &Arc<AnalyticsService> {
        &self.analytics
    }

    /// Validate `long_url` and persist a new link. Returns its short code.
    pub async fn shorten(&self, long_url: &str, owner_id: Option<u64>) -> LinkResult<String> {
        validate_url(long_url)?;

        let link = self
            .store
            .save_link(long_url, owner_id)
            .await
            .map_err(LinkError::Persistence)?;

        info!(short_code = %link.short_code, id = link.id, "Created link");
        Ok(link.short_code)
    }

    /// Resolve `short_code` to its destination URL.
    ///
    /// On a cache hit the store is not consulted. Side effects (cache
    /// population, click recording) are dispatched before returning but
    /// may complete at any later point.
    pub async fn redirect(&self, short_code: &str, client: ClickContext) -> LinkResult<String> {
        codec::decode(short_code)?;
        let clicked_at = Utc::now().timestamp();

        let (link, populate) = match self.cached_link(short_code).await {
            Some(link) => {
                debug!(short_code, "Cache hit");
                (link, self.config.ttl_policy == CacheTtlPolicy::Sliding)
            }
            None => {
                let link = self
                    .store
                    .get_link_by_code(short_code)
                    .await?
                    .ok_or(LinkError::LinkNotFound)?;
                debug!(short_code, "Cache miss, resolved from store");
                (link, true)
            }
        };

        let long_url = link.long_url.clone();
        self.dispatch_side_effects(link, populate, client, clicked_at)
            .await;
        Ok(long_url)
    }

    /// Delete a link and its click history, then invalidate the cache.
    ///
    /// A cache invalidation failure is returned as
    /// [`LinkError::CacheInvalidation`] even though the link is already gone
    /// from the store, so the caller can retry the invalidation.
    pub async fn delete_link(&self, short_code: &str, owner_id: u64) -> LinkResult<()> {
        self.store.delete_link(short_code, owner_id).await?;

        if let Err(e) = self.cache.delete(short_code).await {
            error!(short_code, error = %e, "Link deleted but cache invalidation failed");
            return Err(LinkError::CacheInvalidation(e));
        }

        info!(short_code, owner_id, "Deleted link");
        Ok(())
    }

    pub async fn get_user_links(&self, owner_id: u64, limit: u64, offset: u64) -> LinkResult<LinkPage> {
        self.store
            .get_user_links(owner_id, limit, offset)
            .await
            .map_err(LinkError::Persistence)
    }

    pub async fn get_global_stats(&self) -> LinkResult<GlobalStats> {
        let total_links = self
            .store
            .get_total_links()
            .await
            .map_err(LinkError::Persistence)?;
        let total_requests = self
            .store
            .get_total_requests()
            .await
            .map_err(LinkError::Persistence)?;

        Ok(GlobalStats {
            total_links,
            total_requests,
        })
    }

    /// Authoritative lookup, bypassing the cache
    pub async fn get_link_by_code(&self, short_code: &str) -> LinkResult<Link> {
        self.store
            .get_link_by_code(short_code)
            .await?
            .ok_or(LinkError::LinkNotFound)
    }

    /// Click summary for a link, restricted to its owner
    pub async fn link_analytics(
        &self,
        short_code: &str,
        owner_id: u64,
        period: &str,
    ) -> LinkResult<AnalyticsSummary> {
        self.analytics
            .link_analytics(self.store.as_ref(), short_code, owner_id, period)
            .await
    }

    async fn cached_link(&self, short_code: &str) -> Option<Link> {
        let lookup = self.cache.get(short_code);
        let result = match self.config.cache_lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .unwrap_or(Err(CacheError::Timeout(limit))),
            None => lookup.await,
        };

        match result {
            Ok(hit) => hit,
            Err(e) => {
                warn!(short_code, error = %e, "Cache lookup failed, falling back to store");
                None
            }
        }
    }

    async fn dispatch_side_effects(
        &self,
        link: Link,
        populate: bool,
        client: ClickContext,
        clicked_at: i64,
    ) {
        let cache = Arc::clone(&self.cache);
        let analytics = Arc::clone(&self.analytics);
        let ttl = self.config.cache_ttl;
        let short_code = link.short_code.clone();

        let job: BackgroundJob = Box::pin(async move {
            if populate {
                if let Err(e) = cache.set(&link.short_code, &link, ttl).await {
                    warn!(short_code = %link.short_code, error = %e, "Failed to populate cache");
                }
            }

            let event = client.into_event(link.id, clicked_at);
            if let Err(e) = analytics.record_event(event).await {
                error!(short_code = %link.short_code, error = %e, "Failed to record click");
            }
        });

        if self.sink.dispatch(job).await == DispatchOutcome::Dropped {
            warn!(short_code = %short_code, "Redirect side effects dropped");
        }
    }
}
