use crate::codec;
use crate::models::{AnalyticsEvent, Link, LinkPage, NewAnalyticsEvent};
use crate::storage::rows::{clamp_db_int, now_unix, to_db_int, EventRow, LinkRow};
use crate::storage::{AnalyticsStore, LinkStore, StorageError, StorageResult, DEFAULT_ID_FLOOR};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
    id_floor: u64,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
            id_floor: DEFAULT_ID_FLOOR,
        })
    }

    pub fn with_id_floor(mut self, id_floor: u64) -> Self {
        self.id_floor = id_floor;
        self
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGINT PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                long_url TEXT NOT NULL,
                owner_id BIGINT,
                created_at BIGINT NOT NULL
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
                id SMALLINT PRIMARY KEY CHECK (id = 1),
                next_id BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("INSERT INTO link_counter (id, next_id) VALUES (1, 1) ON CONFLICT (id) DO NOTHING")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id),
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                device_type TEXT NOT NULL,
                browser TEXT NOT NULL,
                os TEXT NOT NULL,
                clicked_at BIGINT NOT NULL
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
impl LinkStore for PostgresStorage {
    async fn save_link(&self, long_url: &str, owner_id: Option<u64>) -> StorageResult<Link> {
        let owner = owner_id.map(|id| to_db_int("owner id", id)).transpose()?;
        let created_at = now_unix();
        let mut tx = self.pool.begin().await?;

        // The row lock taken by UPDATE makes read-rebase-increment a single step
        let id: i64 = sqlx::query_scalar(
            r#"
            UPDATE link_counter
            SET next_id = GREATEST(next_id, $1) + 1
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
            VALUES ($1, $2, $3, $4, $5)
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
            WHERE short_code = $1
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

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE owner_id = $1")
            .bind(owner)
            .fetch_one(self.pool.as_ref())
            .await?;

        let links = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, long_url, owner_id, created_at
            FROM links
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
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
        let mut tx = self.pool.begin().await?;

        let link = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, long_url, owner_id, created_at
            FROM links
            WHERE short_code = $1
            FOR UPDATE
            "#,
        )
        .bind(short_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        if link.owner_id != Some(owner) {
            return Err(StorageError::NotOwner);
        }

        sqlx::query("DELETE FROM analytics WHERE link_id = $1")
            .bind(link.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM links WHERE id = $1")
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
impl AnalyticsStore for PostgresStorage {
    async fn save_event(&self, event: &NewAnalyticsEvent) -> StorageResult<u64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO analytics (link_id, ip_address, user_agent, device_type, browser, os, clicked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
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
            WHERE link_id = $1 AND clicked_at >= $2
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
