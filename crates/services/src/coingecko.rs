use async_trait::async_trait;
use pricefeed_models::{FeedError, Result};
use serde_json::Value;

use crate::provider::{get_success, parse_price_text};
use crate::PriceProvider;

/// Simple price endpoint of the CoinGecko API.
pub struct CoinGeckoProvider {
    client: reqwest::Client,
    endpoint: String,
    coin_id: String,
    vs_currency: String,
}

impl CoinGeckoProvider {
    pub fn new(client: reqwest::Client, base_url: &str, coin_id: &str, vs_currency: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/v3/simple/price", base_url.trim_end_matches('/')),
            coin_id: coin_id.to_string(),
            vs_currency: vs_currency.to_string(),
        }
    }

    /// Extracts `{coin: {currency: price}}`, honoring an embedded
    /// `status.error_code` even when the HTTP status was 200.
    fn parse_simple_price(&self, body: &[u8]) -> Result<f64> {
        let payload: Value = serde_json::from_slice(body)?;

        if let Some(status) = payload.get("status") {
            let code = status.get("error_code").and_then(Value::as_i64).unwrap_or(0);
            if code != 0 {
                let message = status
                    .get("error_message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(FeedError::Upstream { code, message });
            }
        }

        let price = payload
            .get(&self.coin_id)
            .and_then(|coin| coin.get(&self.vs_currency))
            .ok_or(FeedError::MissingPrice)?;

        match price {
            Value::Number(number) => number
                .as_f64()
                .filter(|p| p.is_finite())
                .ok_or_else(|| FeedError::InvalidPrice {
                    value: number.to_string(),
                }),
            Value::String(text) => parse_price_text(text),
            Value::Null => Err(FeedError::MissingPrice),
            other => Err(FeedError::InvalidPrice {
                value: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    async fn fetch_price(&self) -> Result<f64> {
        let request = self.client.get(&self.endpoint).query(&[
            ("ids", self.coin_id.as_str()),
            ("vs_currencies", self.vs_currency.as_str()),
        ]);
        let body = get_success(request).await?.bytes().await?;
        self.parse_simple_price(&body)
    }

    fn name(&self) -> &'static str {
        "coingecko"
    }
}
