use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use pricefeed_models::PriceUpdateEvent;
use pricefeed_services::FeedMetrics;
use pricefeed_store::EventStore;
use pricefeed_stream::BroadcastHub;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::error;

use crate::stream_prices;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub hub: Arc<BroadcastHub>,
    pub metrics: Arc<FeedMetrics>,
    /// Parent of every stream session's cancellation token.
    pub shutdown: CancellationToken,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub subscribers: usize,
    pub latest: Option<PriceUpdateEvent>,
}

pub fn create_routes(static_dir: &Path) -> Router<AppState> {
    Router::new()
        // Live price stream
        .route("/prices/stream", get(stream_prices))

        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))

        // Static front-end
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))

        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.hub.subscriber_count(),
        latest: state.store.latest_event().await,
    })
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render(&state.hub) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pricefeed_store::MemoryStore;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new(5).unwrap()),
            hub: Arc::new(BroadcastHub::default()),
            metrics: Arc::new(FeedMetrics::new().unwrap()),
            shutdown: CancellationToken::new(),
        }
    }

    async fn get_body(state: AppState, uri: &str) -> (StatusCode, String) {
        let app = create_routes(Path::new("static")).with_state(state);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = test_state();
        state.store.store(PriceUpdateEvent::new(100, 50_000.0)).await.unwrap();

        let (status, body) = get_body(state, "/health").await;
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["subscribers"], 0);
        assert_eq!(health["latest"]["timestamp"], 100);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, body) = get_body(test_state(), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("pricefeed_active_subscribers"));
    }

    #[tokio::test]
    async fn test_invalid_since_still_opens_stream() {
        let app = create_routes(Path::new("static")).with_state(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/prices/stream?since=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    }
}
