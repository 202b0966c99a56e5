use config::{Config, ConfigError, Environment, File};
use pricefeed_services::FeedSettings;
use pricefeed_store::StoreSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub feed: FeedSettings,
    pub store: StoreSettings,
    pub hub: HubConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub mailbox_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("server.static_dir", "./static")?
            .set_default("feed.provider", "coingecko")?
            .set_default("feed.interval_secs", 10)?
            .set_default("feed.request_timeout_secs", 5)?
            .set_default("feed.binance_base_url", "https://api.binance.com")?
            .set_default("feed.coingecko_base_url", "https://api.coingecko.com")?
            .set_default("feed.symbol", "BTCUSDT")?
            .set_default("feed.coin_id", "bitcoin")?
            .set_default("feed.vs_currency", "usd")?
            .set_default("store.backend", "memory")?
            .set_default("store.capacity", 100)?
            .set_default("store.database_url", "postgresql://localhost:5432/pricefeed")?
            .set_default("store.max_connections", 5)?
            .set_default("store.ttl_secs", 3600)?
            .set_default("store.connect_timeout_secs", 10)?
            .set_default("hub.mailbox_capacity", 10)?
            .set_default("log.json", false)?
            // Add in settings from configuration file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from environment variables, e.g. PRICEFEED__STORE__CAPACITY
            .add_source(Environment::with_prefix("PRICEFEED").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.interval_secs == 0 {
            return Err(ConfigError::Message("feed.interval_secs must be greater than zero".into()));
        }
        if self.store.capacity == 0 {
            return Err(ConfigError::Message("store.capacity must be greater than zero".into()));
        }
        if self.hub.mailbox_capacity == 0 {
            return Err(ConfigError::Message("hub.mailbox_capacity must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
