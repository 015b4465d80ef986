use crate::cache::{CacheError, LinkCache};
use crate::models::Link;
use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CachedLink {
    link: Arc<Link>,
    ttl: Duration,
}

/// Expire each entry after the TTL it was written with
struct WriteTtl;

impl Expiry<String, CachedLink> for WriteTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedLink,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedLink,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process link cache (Moka) with per-entry expiration
///
/// Reads never extend an entry's lifetime; only `set` does.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, CachedLink>,
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(WriteTtl)
            .build();

        Self { entries }
    }
}

#[async_trait]
impl LinkCache for MemoryCache {
    async fn get(&self, short_code: &str) -> Result<Option<Link>, CacheError> {
        Ok(self
            .entries
            .get(short_code)
            .await
            .map(|cached| cached.link.as_ref().clone()))
    }

    async fn set(&self, short_code: &str, link: &Link, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(
                short_code.to_string(),
                CachedLink {
                    link: Arc::new(link.clone()),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, short_code: &str) -> Result<(), CacheError> {
        self.entries.invalidate(short_code).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_link(code: &str) -> Link {
        Link {
            id: 1,
            short_code: code.to_string(),
            long_url: "https://example.com".to_string(),
            owner_id: None,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new(100);
        let link = sample_link("abc");

        assert!(cache.get("abc").await.unwrap().is_none());

        cache.set("abc", &link, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("abc").await.unwrap(), Some(link));

        cache.delete("abc").await.unwrap();
        assert!(cache.get("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new(100);
        cache
            .set("short", &sample_link("short"), Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set("long", &sample_link("long"), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reads_do_not_extend_ttl() {
        let cache = MemoryCache::new(100);
        cache
            .set("hot", &sample_link("hot"), Duration::from_millis(120))
            .await
            .unwrap();

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let _ = cache.get("hot").await.unwrap();
        }

        assert!(cache.get("hot").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_ttl() {
        let cache = MemoryCache::new(100);
        cache
            .set("key", &sample_link("key"), Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set("key", &sample_link("key"), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("key").await.unwrap().is_some());
    }
}
