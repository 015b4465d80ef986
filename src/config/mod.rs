use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::analytics::{IpAnonymizer, DEFAULT_PERIOD};
use crate::recorder::OverflowPolicy;
use crate::service::{CacheTtlPolicy, LinkServiceConfig};
use crate::storage::DEFAULT_ID_FLOOR;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub recorder: RecorderConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
    /// Lowest link identifier handed out by the counter
    pub id_floor: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
    pub ttl_policy: CacheTtlPolicy,
    /// 0 disables the lookup timeout
    pub lookup_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderMode {
    /// Bounded queue drained by a worker pool
    Queued,
    /// One spawned task per redirect, no bound
    Detached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub mode: RecorderMode,
    pub workers: usize,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub default_period: String,
    pub ipv4_prefix: u8,
    pub ipv6_prefix: u8,
}

impl CacheConfig {
    pub fn link_service_config(&self) -> LinkServiceConfig {
        LinkServiceConfig {
            cache_ttl: Duration::from_secs(self.ttl_secs),
            ttl_policy: self.ttl_policy,
            cache_lookup_timeout: (self.lookup_timeout_ms > 0)
                .then(|| Duration::from_millis(self.lookup_timeout_ms)),
        }
    }
}

impl AnalyticsConfig {
    pub fn anonymizer(&self) -> IpAnonymizer {
        IpAnonymizer::new(self.ipv4_prefix, self.ipv6_prefix)
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("DATABASE_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => DatabaseBackend::Sqlite,
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://./shrink.db?mode=rwc".to_string());

        let ttl_policy = match lookup("CACHE_TTL_POLICY")
            .unwrap_or_else(|| "fixed".to_string())
            .to_lowercase()
            .as_str()
        {
            "fixed" => CacheTtlPolicy::Fixed,
            "sliding" => CacheTtlPolicy::Sliding,
            other => {
                tracing::warn!(
                    "Unknown CACHE_TTL_POLICY '{other}', falling back to 'fixed'. Supported values: fixed, sliding"
                );
                CacheTtlPolicy::Fixed
            }
        };

        let recorder_mode = match lookup("RECORDER_MODE")
            .unwrap_or_else(|| "queued".to_string())
            .to_lowercase()
            .as_str()
        {
            "queued" => RecorderMode::Queued,
            "detached" => RecorderMode::Detached,
            other => {
                tracing::warn!(
                    "Unknown RECORDER_MODE '{other}', falling back to 'queued'. Supported values: queued, detached"
                );
                RecorderMode::Queued
            }
        };

        let overflow = match lookup("RECORDER_OVERFLOW")
            .unwrap_or_else(|| "drop_oldest".to_string())
            .to_lowercase()
            .as_str()
        {
            "block" => OverflowPolicy::Block,
            "drop_newest" => OverflowPolicy::DropNewest,
            "drop_oldest" => OverflowPolicy::DropOldest,
            other => {
                tracing::warn!(
                    "Unknown RECORDER_OVERFLOW '{other}', falling back to 'drop_oldest'. Supported values: block, drop_newest, drop_oldest"
                );
                OverflowPolicy::DropOldest
            }
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
                id_floor: parse_var(&lookup, "LINK_ID_FLOOR", DEFAULT_ID_FLOOR)?,
            },
            cache: CacheConfig {
                max_entries: parse_var(&lookup, "CACHE_MAX_ENTRIES", 100_000)?,
                ttl_secs: parse_var(&lookup, "CACHE_TTL_SECS", 86_400)?,
                ttl_policy,
                lookup_timeout_ms: parse_var(&lookup, "CACHE_LOOKUP_TIMEOUT_MS", 50)?,
            },
            recorder: RecorderConfig {
                mode: recorder_mode,
                workers: parse_var(&lookup, "RECORDER_WORKERS", 4)?,
                queue_capacity: parse_var(&lookup, "RECORDER_QUEUE_CAPACITY", 10_000)?,
                overflow,
            },
            analytics: AnalyticsConfig {
                default_period: lookup("ANALYTICS_DEFAULT_PERIOD")
                    .unwrap_or_else(|| DEFAULT_PERIOD.to_string()),
                ipv4_prefix: parse_var(&lookup, "ANALYTICS_IPV4_PREFIX", 24)?,
                ipv6_prefix: parse_var(&lookup, "ANALYTICS_IPV6_PREFIX", 48)?,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.url, "sqlite://./shrink.db?mode=rwc");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.id_floor, 100_000);
        assert_eq!(config.cache.max_entries, 100_000);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.cache.ttl_policy, CacheTtlPolicy::Fixed);
        assert_eq!(config.recorder.mode, RecorderMode::Queued);
        assert_eq!(config.recorder.workers, 4);
        assert_eq!(config.recorder.queue_capacity, 10_000);
        assert_eq!(config.recorder.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.analytics.default_period, "30d");
        assert_eq!(config.analytics.anonymizer(), IpAnonymizer::default());

        let service = config.cache.link_service_config();
        assert_eq!(service.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(service.cache_lookup_timeout, Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_BACKEND", "PostgreSQL"),
            ("DATABASE_URL", "postgres://localhost/shrink"),
            ("LINK_ID_FLOOR", "0"),
            ("CACHE_TTL_POLICY", "sliding"),
            ("CACHE_LOOKUP_TIMEOUT_MS", "0"),
            ("RECORDER_MODE", "detached"),
            ("RECORDER_OVERFLOW", "block"),
            ("ANALYTICS_DEFAULT_PERIOD", "7d"),
        ])
        .unwrap();

        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(config.database.url, "postgres://localhost/shrink");
        assert_eq!(config.database.id_floor, 0);
        assert_eq!(config.cache.ttl_policy, CacheTtlPolicy::Sliding);
        assert_eq!(config.cache.link_service_config().cache_lookup_timeout, None);
        assert_eq!(config.recorder.mode, RecorderMode::Detached);
        assert_eq!(config.recorder.overflow, OverflowPolicy::Block);
        assert_eq!(config.analytics.default_period, "7d");
    }

    #[test]
    fn test_unknown_enum_values_fall_back() {
        let config = config_from(&[
            ("DATABASE_BACKEND", "mysql"),
            ("CACHE_TTL_POLICY", "forever"),
            ("RECORDER_OVERFLOW", "panic"),
        ])
        .unwrap();

        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.cache.ttl_policy, CacheTtlPolicy::Fixed);
        assert_eq!(config.recorder.overflow, OverflowPolicy::DropOldest);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config_from(&[("RECORDER_WORKERS", "many")]).unwrap_err();
        assert!(err.to_string().contains("RECORDER_WORKERS"));

        assert!(config_from(&[("ANALYTICS_IPV4_PREFIX", "300")]).is_err());
    }
}
