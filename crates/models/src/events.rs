use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single price sample, keyed by the epoch second it was taken at.
///
/// Serializes as `{"timestamp": <integer>, "price": <number>}`, which is
/// exactly the payload carried by each server-sent event frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceUpdateEvent {
    pub timestamp: i64,
    pub price: f64,
}

impl PriceUpdateEvent {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// Stamps `price` with the current wall-clock second.
    pub fn now(price: f64) -> Self {
        Self::new(Utc::now().timestamp(), price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = PriceUpdateEvent::new(1_700_000_000, 43_250.5);
        let json = serde_json::to_string(&event).unwrap();

        assert_eq!(json, r#"{"timestamp":1700000000,"price":43250.5}"#);
    }

    #[test]
    fn test_event_decodes_integer_price() {
        let event: PriceUpdateEvent =
            serde_json::from_str(r#"{"timestamp": 200, "price": 51000}"#).unwrap();

        assert_eq!(event, PriceUpdateEvent::new(200, 51_000.0));
    }

    #[test]
    fn test_now_uses_current_second() {
        let before = Utc::now().timestamp();
        let event = PriceUpdateEvent::now(1.0);
        let after = Utc::now().timestamp();

        assert!(event.timestamp >= before && event.timestamp <= after);
    }
}
