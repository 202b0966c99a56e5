use std::sync::Arc;
use std::time::Duration;

use pricefeed_models::{FeedError, PriceUpdateEvent, Result};
use pricefeed_store::EventStore;
use pricefeed_stream::NotificationSender;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{FeedMetrics, PriceProvider};

/// Polls the provider on a fixed cadence, records each sample and nudges
/// the broadcast hub.
///
/// Failures never stop the loop; the next tick is the retry. The hub
/// notification is best effort: if the single slot is still occupied the
/// update is only reachable through store replay.
#[derive(Clone)]
pub struct AcquisitionLoop {
    interval: Duration,
    store: Arc<dyn EventStore>,
    provider: Arc<dyn PriceProvider>,
    notifications: NotificationSender,
    metrics: Arc<FeedMetrics>,
}

impl AcquisitionLoop {
    pub fn new(
        interval: Duration,
        store: Arc<dyn EventStore>,
        provider: Arc<dyn PriceProvider>,
        notifications: NotificationSender,
        metrics: Arc<FeedMetrics>,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(FeedError::InvalidInterval);
        }

        Ok(Self {
            interval,
            store,
            provider,
            notifications,
            metrics,
        })
    }

    /// Runs until `shutdown` fires. A fetch already in flight is allowed to
    /// finish; cancellation is only observed between ticks.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("🎯 Starting price acquisition");
        info!("⚙️  Provider: {}", self.provider.name());
        info!("⏱️  Poll interval: {:?}", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Stopping price acquisition");
    }

    /// One acquisition cycle. Returns the recorded event, or `None` when the
    /// provider failed.
    pub async fn tick(&self) -> Option<PriceUpdateEvent> {
        let price = match self.provider.fetch_price().await {
            Ok(price) => price,
            Err(e) => {
                self.metrics.fetch_errors.inc();
                error!(provider = self.provider.name(), error = %e, "❌ Error fetching price");
                return None;
            }
        };
        self.metrics.prices_fetched.inc();

        let event = PriceUpdateEvent::now(price);

        if let Err(e) = self.store.store(event).await {
            self.metrics.store_errors.inc();
            error!(timestamp = event.timestamp, error = %e, "Error storing price update");
        }

        match self.notifications.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metrics.notifications_dropped.inc();
                debug!(timestamp = event.timestamp, "Update channel full, notification skipped");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(timestamp = event.timestamp, "Broadcast hub stopped, notification skipped");
            }
        }

        info!("💰 New price: ${:.2} at {}", event.price, event.timestamp);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockPriceProvider;
    use pricefeed_store::MemoryStore;
    use pricefeed_stream::notification_channel;
    use tokio::time::timeout;

    fn mock_provider(mut prices: Vec<Result<f64>>) -> MockPriceProvider {
        prices.reverse();
        let mut provider = MockPriceProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_price()
            .returning(move || prices.pop().unwrap_or(Err(FeedError::MissingPrice)));
        provider
    }

    fn acquisition(
        provider: MockPriceProvider,
        store: Arc<MemoryStore>,
        notifications: NotificationSender,
        interval: Duration,
    ) -> AcquisitionLoop {
        AcquisitionLoop::new(
            interval,
            store,
            Arc::new(provider),
            notifications,
            Arc::new(FeedMetrics::new().unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let (tx, _rx) = notification_channel();
        let result = AcquisitionLoop::new(
            Duration::ZERO,
            Arc::new(MemoryStore::new(10).unwrap()),
            Arc::new(MockPriceProvider::new()),
            tx,
            Arc::new(FeedMetrics::new().unwrap()),
        );

        assert!(matches!(result, Err(FeedError::InvalidInterval)));
    }

    #[tokio::test]
    async fn test_tick_stores_and_notifies() {
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let (tx, mut rx) = notification_channel();
        let feed = acquisition(
            mock_provider(vec![Ok(55_000.0)]),
            store.clone(),
            tx,
            Duration::from_secs(10),
        );

        let event = feed.tick().await.unwrap();

        assert_eq!(event.price, 55_000.0);
        assert_eq!(store.latest_event().await, Some(event));
        assert_eq!(rx.recv().await, Some(event));
        assert_eq!(feed.metrics.prices_fetched.get(), 1);
    }

    #[tokio::test]
    async fn test_tick_failure_records_nothing() {
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let (tx, mut rx) = notification_channel();
        let feed = acquisition(
            mock_provider(vec![Err(FeedError::MissingPrice)]),
            store.clone(),
            tx,
            Duration::from_secs(10),
        );

        assert!(feed.tick().await.is_none());
        assert!(store.is_empty());
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.metrics.fetch_errors.get(), 1);
    }

    #[tokio::test]
    async fn test_occupied_slot_drops_notification_but_keeps_history() {
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let (tx, mut rx) = notification_channel();
        let feed = acquisition(
            mock_provider(vec![Ok(1.0), Ok(2.0)]),
            store.clone(),
            tx,
            Duration::from_secs(10),
        );

        feed.tick().await.unwrap();
        feed.tick().await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(rx.recv().await.unwrap().price, 1.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.metrics.notifications_dropped.get(), 1);
    }

    #[tokio::test]
    async fn test_run_survives_errors_and_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let (tx, mut rx) = notification_channel();
        let feed = acquisition(
            mock_provider(vec![Err(FeedError::MissingPrice), Ok(42.0)]),
            store.clone(),
            tx,
            Duration::from_millis(10),
        );
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let feed = feed.clone();
            let shutdown = shutdown.clone();
            async move { feed.run(shutdown).await }
        });

        let received = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(received.price, 42.0);

        shutdown.cancel();
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(feed.metrics.fetch_errors.get() >= 1);
    }
}
