use std::time::Duration;

use async_trait::async_trait;
use pricefeed_models::{PriceUpdateEvent, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::schema::PriceRow;
use crate::EventStore;

/// Postgres-backed history where every row carries an expiry instant.
///
/// Reads ignore expired rows; `purge_expired` physically removes them and is
/// driven periodically by the store factory.
pub struct PostgresStore {
    pool: PgPool,
    ttl: Duration,
}

impl PostgresStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
        ttl: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await?;

        let store = Self::from_pool(pool, ttl);
        store.run_migrations().await?;
        store.health_check().await?;
        Ok(store)
    }

    /// Wraps an already migrated pool.
    pub fn from_pool(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i32, _>("health") == 1)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Deletes rows whose retention window has elapsed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM price_updates WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl EventStore for PostgresStore {
    async fn store(&self, event: PriceUpdateEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO price_updates (timestamp, price, expires_at) \
             VALUES ($1, $2, NOW() + ($3::double precision * INTERVAL '1 second'))",
        )
        .bind(event.timestamp)
        .bind(event.price)
        .bind(self.ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn events_since(&self, since: i64) -> Vec<PriceUpdateEvent> {
        let rows = sqlx::query_as::<_, PriceRow>(
            "SELECT timestamp, price FROM price_updates \
             WHERE timestamp >= $1 AND expires_at > NOW() \
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => rows.into_iter().map(PriceUpdateEvent::from).collect(),
            Err(e) => {
                tracing::error!(error = %e, since, "Failed to load events from Postgres");
                Vec::new()
            }
        }
    }

    async fn latest_event(&self) -> Option<PriceUpdateEvent> {
        let row = sqlx::query_as::<_, PriceRow>(
            "SELECT timestamp, price FROM price_updates \
             WHERE expires_at > NOW() \
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(row) => row.map(PriceUpdateEvent::from),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load latest event from Postgres");
                None
            }
        }
    }
}
