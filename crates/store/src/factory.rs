use std::sync::Arc;
use std::time::Duration;

use pricefeed_models::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{EventStore, MemoryStore, PostgresStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[serde(alias = "postgresql")]
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub capacity: usize,
    pub database_url: String,
    pub max_connections: u32,
    pub ttl_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            capacity: 100,
            database_url: "postgresql://localhost:5432/pricefeed".to_string(),
            max_connections: 5,
            ttl_secs: 3600,
            connect_timeout_secs: 10,
        }
    }
}

/// Builds the configured backend.
///
/// A Postgres backend that cannot be reached falls back to the in-memory
/// ring buffer so the feed keeps running. For Postgres, a purge task is
/// spawned that removes expired rows until `shutdown` fires.
pub async fn build_store(
    settings: &StoreSettings,
    shutdown: CancellationToken,
) -> Result<Arc<dyn EventStore>> {
    match settings.backend {
        StoreBackend::Memory => memory_store(settings),
        StoreBackend::Postgres => {
            let ttl = Duration::from_secs(settings.ttl_secs);
            let connected = PostgresStore::connect(
                &settings.database_url,
                settings.max_connections,
                Duration::from_secs(settings.connect_timeout_secs),
                ttl,
            )
            .await;

            match connected {
                Ok(store) => {
                    info!(ttl_secs = settings.ttl_secs, "🗄️  Using Postgres event store");
                    let store = Arc::new(store);
                    tokio::spawn(purge_expired_loop(store.clone(), purge_period(ttl), shutdown));
                    Ok(store as Arc<dyn EventStore>)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to create Postgres store, falling back to memory store");
                    memory_store(settings)
                }
            }
        }
    }
}

fn memory_store(settings: &StoreSettings) -> Result<Arc<dyn EventStore>> {
    info!(capacity = settings.capacity, "🧠 Using memory event store");
    let store = MemoryStore::new(settings.capacity)?;
    Ok(Arc::new(store) as Arc<dyn EventStore>)
}

fn purge_period(ttl: Duration) -> Duration {
    (ttl / 4).max(Duration::from_secs(1))
}

async fn purge_expired_loop(store: Arc<PostgresStore>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Purged expired price updates"),
                Err(e) => warn!(error = %e, "Failed to purge expired price updates"),
            },
        }
    }

    store.close().await;
    debug!("Stopped Postgres purge task");
}
