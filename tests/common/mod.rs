// Shared helpers for driving the router and reading server-sent events

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{HeaderMap, Request, StatusCode};
use futures::StreamExt;
use pricefeed_api::{create_routes, AppState};
use pricefeed_models::PriceUpdateEvent;
use pricefeed_services::FeedMetrics;
use pricefeed_store::{EventStore, MemoryStore};
use pricefeed_stream::BroadcastHub;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub hub: Arc<BroadcastHub>,
    pub metrics: Arc<FeedMetrics>,
    pub shutdown: CancellationToken,
}

impl TestApp {
    pub async fn with_history(capacity: usize, timestamps: &[i64]) -> Self {
        let store = Arc::new(MemoryStore::new(capacity).unwrap());
        for &ts in timestamps {
            store
                .store(PriceUpdateEvent::new(ts, 50_000.0 + ts as f64))
                .await
                .unwrap();
        }

        Self {
            store,
            hub: Arc::new(BroadcastHub::default()),
            metrics: Arc::new(FeedMetrics::new().unwrap()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            hub: self.hub.clone(),
            metrics: self.metrics.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    pub async fn connect(&self, uri: &str) -> SseClient {
        let app = create_routes(Path::new("static")).with_state(self.state());
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        SseClient {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    pub async fn wait_for_subscribers(&self, expected: usize) {
        timeout(FRAME_TIMEOUT, async {
            while self.hub.subscriber_count() != expected {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count never reached expected value");
    }
}

pub struct SseClient {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: BodyDataStream,
    buffer: String,
}

impl SseClient {
    /// Next `data:` payload, or `None` if nothing arrives within `wait`.
    pub async fn next_event_within(&mut self, wait: Duration) -> Option<Value> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                let data = frame
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(str::trim_start)
                    .collect::<String>();
                if data.is_empty() {
                    continue;
                }
                return Some(serde_json::from_str(&data).unwrap());
            }

            match timeout(wait, self.body.next()).await {
                Ok(Some(Ok(chunk))) => self.buffer.push_str(&String::from_utf8_lossy(&chunk)),
                _ => return None,
            }
        }
    }

    pub async fn next_timestamp(&mut self) -> i64 {
        let event = self
            .next_event_within(FRAME_TIMEOUT)
            .await
            .expect("timed out waiting for a stream event");
        event["timestamp"].as_i64().unwrap()
    }

    pub async fn assert_quiet(&mut self) {
        assert_eq!(self.next_event_within(QUIET_PERIOD).await, None);
    }
}
