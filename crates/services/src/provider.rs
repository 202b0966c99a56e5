use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pricefeed_models::{FeedError, Result};
use serde::{Deserialize, Serialize};

use crate::{BinanceProvider, CoinGeckoProvider};

/// Source of a single price sample.
///
/// Implementations surface every transport, status or parse failure as an
/// error and never retry; the acquisition cadence is the retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self) -> Result<f64>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Binance,
    CoinGecko,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    pub provider: ProviderKind,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    pub binance_base_url: String,
    pub coingecko_base_url: String,
    pub symbol: String,
    pub coin_id: String,
    pub vs_currency: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::CoinGecko,
            interval_secs: 10,
            request_timeout_secs: 5,
            binance_base_url: "https://api.binance.com".to_string(),
            coingecko_base_url: "https://api.coingecko.com".to_string(),
            symbol: "BTCUSDT".to_string(),
            coin_id: "bitcoin".to_string(),
            vs_currency: "usd".to_string(),
        }
    }
}

impl FeedSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

pub fn build_provider(settings: &FeedSettings) -> Result<Arc<dyn PriceProvider>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .user_agent(concat!("pricefeed-rs/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let provider: Arc<dyn PriceProvider> = match settings.provider {
        ProviderKind::Binance => Arc::new(BinanceProvider::new(
            client,
            &settings.binance_base_url,
            &settings.symbol,
        )),
        ProviderKind::CoinGecko => Arc::new(CoinGeckoProvider::new(
            client,
            &settings.coingecko_base_url,
            &settings.coin_id,
            &settings.vs_currency,
        )),
    };

    Ok(provider)
}

/// Issues the GET and rejects non-2xx responses before the body is read.
pub(crate) async fn get_success(
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::UpstreamStatus {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Parses a textual price, rejecting blanks and non-finite values.
pub(crate) fn parse_price_text(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FeedError::MissingPrice);
    }

    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(FeedError::InvalidPrice {
            value: raw.to_string(),
        }),
    }
}
