use crate::codec;
use crate::models::{AnalyticsEvent, Link, LinkPage, NewAnalyticsEvent};
use crate::storage::rows::{clamp_db_int, now_unix, to_db_int, EventRow, LinkRow};
use crate::storage::{AnalyticsStore, LinkStore, StorageError, StorageResult, DEFAULT_ID_FLOOR};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
    id_floor: u64,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
            id_floor: DEFAULT_ID_FLOOR,
        })
    }

    /// Set the lowest identifier the counter will hand out
    pub fn with_id_floor(mut self, id_floor: u64) -> Self {
        self.id_floor = id_floor;
        self
    }

    /// Create tables and seed the identifier counter
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                long_url TEXT NOT NULL,
                owner_id INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS link_counter (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                next_id INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("INSERT INTO link_counter (id, next_id) VALUES (1, 1) ON CONFLICT(id) DO NOTHING")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id),
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                device_type TEXT NOT NULL,
                browser TEXT NOT NULL,
                os TEXT NOT NULL,
                clicked_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analytics_link_time ON analytics(link_id, clicked_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LinkStore for SqliteStorage {
    async fn save_link(&self, long_url: &str, owner_id: Option<u64>) -> StorageResult<Link> {
        let owner = owner_id.map(|id| to_db_int("owner id", id)).transpose()?;
        let created_at = now_unix();
        let mut tx = self.pool.begin().await?;

        // Allocate and rebase in one statement; the row write lock serializes callers
        let id: i64 = sqlx::query_scalar(
            r#"
            UPDATE link_counter
            SET next_id = MAX(next_id, ?) + 1
            WHERE id = 1
            RETURNING next_id - 1
            "#,
        )
        .bind(to_db_int("id floor", self.id_floor)?)
        .fetch_one(&mut *tx)
        .await?;

        let link = Link {
            id: id as u64,
            short_code: codec::encode(id as u64),
            long_url: long_url.to_string(),
            owner_id,
            created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO links (id, short_code, long_url, owner_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&link.short_code)
        .bind(&link.long_url)
        .bind(owner)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(link)
    }

    async fn get_link_by_code(&self, short_code: &str) -> StorageResult<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, long_url, owner_id, created_at
            FROM links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Link::from))
    }

    async fn get_user_links(
        &self,
        owner_id: u64,
        limit: u64,
        offset: u64,
    ) -> StorageResult<LinkPage> {
        let owner = to_db_int("owner id", owner_id)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE owner_id = ?")
            .bind(owner)
            .fetch_one(self.pool.as_ref())
            .await?;

        let links = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, long_url, owner_id, created_at
            FROM links
            WHERE owner_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(owner)
        .bind(clamp_db_int(limit))
        .bind(clamp_db_int(offset))
        .fetch_all(self.pool.as_ref())
        .await?
        .into_iter()
        .map(Link::from)
        .collect();

        Ok(LinkPage {
            links,
            total: total as u64,
        })
    }

    async fn delete_link(&self, short_code: &str, owner_id: u64) -> StorageResult<()> {
        let owner = to_db_int("owner id", owner_id)?;
        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;

        // Open with a write so the transaction takes the write lock up front;
        // upgrading a read lock later fails with SQLITE_BUSY instead of waiting
        sqlx::query(
            r#"
            DELETE FROM analytics
            WHERE link_id = (SELECT id FROM links WHERE short_code = ? AND owner_id = ?)
            "#,
        )
        .bind(short_code)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        let link = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, long_url, owner_id, created_at
            FROM links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        if link.owner_id != Some(owner) {
            return Err(StorageError::NotOwner);
        }

        sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(link.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn get_total_links(&self) -> StorageResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(total as u64)
    }

    async fn get_total_requests(&self) -> StorageResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(total as u64)
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStorage {
    async fn save_event(&self, event: &NewAnalyticsEvent) -> StorageResult<u64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO analytics (link_id, ip_address, user_agent, device_type, browser, os, clicked_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(to_db_int("link id", event.link_id)?)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.device_type)
        .bind(&event.browser)
        .bind(&event.os)
        .bind(event.clicked_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id as u64)
    }

    async fn get_events(&self, link_id: u64, since: i64) -> StorageResult<Vec<AnalyticsEvent>> {
        let events = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, link_id, ip_address, user_agent, device_type, browser, os, clicked_at
            FROM analytics
            WHERE link_id = ? AND clicked_at >= ?
            ORDER BY clicked_at
            "#,
        )
        .bind(to_db_int("link id", link_id)?)
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?
        .into_iter()
        .map(AnalyticsEvent::from)
        .collect();

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_sqlite(id_floor: u64) -> SqliteStorage {
        let storage = SqliteStorage::new("sqlite::memory:", 1)
            .await
            .unwrap()
            .with_id_floor(id_floor);
        storage.init().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_counter_starts_at_floor() {
        let storage = setup_sqlite(100_000).await;

        let first = storage.save_link("https://example.com/a", None).await.unwrap();
        let second = storage.save_link("https://example.com/b", None).await.unwrap();

        assert_eq!(first.id, 100_000);
        assert_eq!(first.short_code, "Q0u");
        assert_eq!(second.id, 100_001);
        assert_eq!(second.short_code, codec::encode(100_001));
    }

    #[tokio::test]
    async fn test_raising_floor_rebases_counter() {
        let storage = setup_sqlite(0).await;
        let low = storage.save_link("https://example.com/low", None).await.unwrap();
        assert_eq!(low.id, 1);

        let storage = storage.with_id_floor(500);
        let rebased = storage.save_link("https://example.com/high", None).await.unwrap();
        assert_eq!(rebased.id, 500);

        // A lower floor never moves the counter backwards
        let storage = storage.with_id_floor(10);
        let next = storage.save_link("https://example.com/next", None).await.unwrap();
        assert_eq!(next.id, 501);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let storage = setup_sqlite(0).await;
        storage.save_link("https://example.com", None).await.unwrap();

        storage.init().await.unwrap();
        let link = storage.save_link("https://example.com/2", None).await.unwrap();
        assert_eq!(link.id, 2, "re-running init must not reset the counter");
    }

    #[tokio::test]
    async fn test_event_requires_existing_link() {
        let storage = setup_sqlite(0).await;
        let event = NewAnalyticsEvent {
            link_id: 42,
            ip_address: "1.1.1.0".to_string(),
            user_agent: String::new(),
            device_type: "Unknown".to_string(),
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
            clicked_at: now_unix(),
        };

        assert!(storage.save_event(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_identifiers_above_signed_range_are_rejected() {
        let storage = setup_sqlite(0).await;
        let top = i64::MAX as u64;

        let err = storage
            .save_link("https://example.com/huge", Some(u64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::OutOfRange { value: u64::MAX, .. }));

        let link = storage.save_link("https://example.com/top", Some(top)).await.unwrap();
        let fetched = storage.get_link_by_code(&link.short_code).await.unwrap();
        assert_eq!(fetched.and_then(|l| l.owner_id), Some(top));

        // An owner one past the signed range must not match the stored owner
        let err = storage.delete_link(&link.short_code, top + 1).await.unwrap_err();
        assert!(matches!(err, StorageError::OutOfRange { .. }));
        let err = storage.delete_link(&link.short_code, u64::MAX).await.unwrap_err();
        assert!(matches!(err, StorageError::OutOfRange { .. }));
        assert!(storage.get_link_by_code(&link.short_code).await.unwrap().is_some());

        assert!(storage.get_user_links(u64::MAX, 10, 0).await.is_err());
        assert_eq!(storage.get_user_links(top, 10, 0).await.unwrap().total, 1);

        storage.delete_link(&link.short_code, top).await.unwrap();
        assert!(storage.get_link_by_code(&link.short_code).await.unwrap().is_none());
    }
}
