use async_trait::async_trait;
use parking_lot::RwLock;
use pricefeed_models::{FeedError, PriceUpdateEvent, Result};

use crate::EventStore;

/// Fixed-capacity ring buffer of the most recent events.
///
/// Storing is O(1) and never shifts elements; a full scan walks `count`
/// slots starting at `write_index - count` (mod capacity).
pub struct MemoryStore {
    ring: RwLock<Ring>,
}

struct Ring {
    slots: Vec<PriceUpdateEvent>,
    write_index: usize,
    count: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, event: PriceUpdateEvent) {
        let capacity = self.capacity();
        self.slots[self.write_index] = event;
        self.write_index = (self.write_index + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
    }

    /// Valid slots in insertion order.
    fn iter(&self) -> impl Iterator<Item = &PriceUpdateEvent> {
        let capacity = self.capacity();
        let start = (self.write_index + capacity - self.count) % capacity;
        (0..self.count).map(move |offset| &self.slots[(start + offset) % capacity])
    }

    fn latest(&self) -> Option<PriceUpdateEvent> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.capacity();
        Some(self.slots[(self.write_index + capacity - 1) % capacity])
    }
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FeedError::InvalidCapacity(capacity));
        }

        Ok(Self {
            ring: RwLock::new(Ring {
                slots: vec![PriceUpdateEvent::new(0, 0.0); capacity],
                write_index: 0,
                count: 0,
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.ring.read().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn store(&self, event: PriceUpdateEvent) -> Result<()> {
        self.ring.write().push(event);
        Ok(())
    }

    async fn events_since(&self, since: i64) -> Vec<PriceUpdateEvent> {
        let ring = self.ring.read();
        ring.iter()
            .filter(|event| event.timestamp >= since)
            .copied()
            .collect()
    }

    async fn latest_event(&self) -> Option<PriceUpdateEvent> {
        self.ring.read().latest()
    }
}
