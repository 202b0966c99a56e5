use async_trait::async_trait;
use pricefeed_models::{FeedError, Result};
use serde::Deserialize;

use crate::provider::{get_success, parse_price_text};
use crate::PriceProvider;

/// Spot ticker price from the Binance REST API.
pub struct BinanceProvider {
    client: reqwest::Client,
    endpoint: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[serde(default)]
    price: Option<String>,
}

impl BinanceProvider {
    pub fn new(client: reqwest::Client, base_url: &str, symbol: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/v3/ticker/price", base_url.trim_end_matches('/')),
            symbol: symbol.to_string(),
        }
    }
}

/// Binance quotes prices as decimal strings.
fn parse_ticker(body: &[u8]) -> Result<f64> {
    let ticker: TickerPrice = serde_json::from_slice(body)?;
    let raw = ticker.price.ok_or(FeedError::MissingPrice)?;
    parse_price_text(&raw)
}

#[async_trait]
impl PriceProvider for BinanceProvider {
    async fn fetch_price(&self) -> Result<f64> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("symbol", self.symbol.as_str())]);
        let body = get_success(request).await?.bytes().await?;
        parse_ticker(&body)
    }

    fn name(&self) -> &'static str {
        "binance"
    }
}
