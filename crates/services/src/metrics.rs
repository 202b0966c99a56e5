use parking_lot::Mutex;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use pricefeed_stream::BroadcastHub;

/// Prometheus counters for the acquisition path plus hub series that are
/// sampled at scrape time.
pub struct FeedMetrics {
    registry: Registry,
    pub prices_fetched: IntCounter,
    pub fetch_errors: IntCounter,
    pub store_errors: IntCounter,
    pub notifications_dropped: IntCounter,
    active_subscribers: IntGauge,
    dropped_deliveries: IntCounter,
    /// Serializes scrapes so hub totals are folded into the counter once.
    scrape: Mutex<()>,
}

impl FeedMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let prices_fetched = IntCounter::new(
            "pricefeed_prices_fetched_total",
            "Price samples successfully fetched from the provider",
        )?;
        let fetch_errors = IntCounter::new(
            "pricefeed_fetch_errors_total",
            "Provider fetches that failed",
        )?;
        let store_errors = IntCounter::new(
            "pricefeed_store_errors_total",
            "Events the store failed to persist",
        )?;
        let notifications_dropped = IntCounter::new(
            "pricefeed_notifications_dropped_total",
            "Live notifications skipped because the hub had not drained the previous one",
        )?;
        let active_subscribers = IntGauge::new(
            "pricefeed_active_subscribers",
            "Currently registered stream subscribers",
        )?;
        let dropped_deliveries = IntCounter::new(
            "pricefeed_dropped_deliveries_total",
            "Per-subscriber deliveries skipped because a mailbox was full",
        )?;

        registry.register(Box::new(prices_fetched.clone()))?;
        registry.register(Box::new(fetch_errors.clone()))?;
        registry.register(Box::new(store_errors.clone()))?;
        registry.register(Box::new(notifications_dropped.clone()))?;
        registry.register(Box::new(active_subscribers.clone()))?;
        registry.register(Box::new(dropped_deliveries.clone()))?;

        Ok(Self {
            registry,
            prices_fetched,
            fetch_errors,
            store_errors,
            notifications_dropped,
            active_subscribers,
            dropped_deliveries,
            scrape: Mutex::new(()),
        })
    }

    /// Samples the hub and encodes everything in the text format.
    pub fn render(&self, hub: &BroadcastHub) -> prometheus::Result<String> {
        {
            let _scrape = self.scrape.lock();
            self.active_subscribers
                .set(i64::try_from(hub.subscriber_count()).unwrap_or(i64::MAX));
            let unseen = hub
                .dropped_deliveries()
                .saturating_sub(self.dropped_deliveries.get());
            self.dropped_deliveries.inc_by(unseen);
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricefeed_models::PriceUpdateEvent;

    #[test]
    fn test_render_includes_hub_gauges() {
        let metrics = FeedMetrics::new().unwrap();
        let hub = BroadcastHub::default();
        let _first = hub.subscribe();
        let _second = hub.subscribe();
        metrics.prices_fetched.inc();

        let text = metrics.render(&hub).unwrap();

        assert!(text.contains("pricefeed_prices_fetched_total 1"));
        assert!(text.contains("pricefeed_active_subscribers 2"));
        assert!(text.contains("pricefeed_dropped_deliveries_total 0"));
    }

    #[test]
    fn test_dropped_deliveries_is_a_monotonic_counter() {
        let metrics = FeedMetrics::new().unwrap();
        let hub = BroadcastHub::new(1);
        let _subscription = hub.subscribe();

        for ts in 1..=3 {
            hub.publish(PriceUpdateEvent::new(ts, 1.0));
        }
        let first = metrics.render(&hub).unwrap();
        let second = metrics.render(&hub).unwrap();

        assert!(first.contains("# TYPE pricefeed_dropped_deliveries_total counter"));
        assert!(first.contains("pricefeed_dropped_deliveries_total 2"));
        assert!(second.contains("pricefeed_dropped_deliveries_total 2"));
    }
}
