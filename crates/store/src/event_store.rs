use async_trait::async_trait;
use pricefeed_models::{PriceUpdateEvent, Result};

/// Ordered, bounded history of price events.
///
/// Writes come from a single acquisition task; reads come concurrently from
/// every stream session performing replay. Implementations must return
/// events in ascending timestamp order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `event`. Backends with a bounded history evict the oldest
    /// entry when full.
    async fn store(&self, event: PriceUpdateEvent) -> Result<()>;

    /// All retained events with `timestamp >= since`, oldest first. Empty
    /// when nothing qualifies.
    async fn events_since(&self, since: i64) -> Vec<PriceUpdateEvent>;

    /// The most recently stored event, if any.
    async fn latest_event(&self) -> Option<PriceUpdateEvent>;
}
