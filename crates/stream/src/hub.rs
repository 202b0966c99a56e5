use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use pricefeed_models::PriceUpdateEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::NotificationReceiver;

pub const DEFAULT_MAILBOX_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving half of one subscriber's bounded mailbox.
///
/// `recv` yields `None` once the hub has unsubscribed this mailbox and any
/// already-buffered events have been drained.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    mailbox: mpsc::Receiver<PriceUpdateEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<PriceUpdateEvent> {
        self.mailbox.recv().await
    }

    pub fn try_recv(&mut self) -> Result<PriceUpdateEvent, mpsc::error::TryRecvError> {
        self.mailbox.try_recv()
    }
}

/// Registry of live subscriber mailboxes with lossy fan-out.
///
/// `publish` holds the registry read lock while it iterates; `subscribe` and
/// `unsubscribe` take the write lock. Sends never block: a full mailbox
/// loses the event for that subscriber only.
pub struct BroadcastHub {
    mailbox_capacity: usize,
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<PriceUpdateEvent>>>,
    dropped_deliveries: AtomicU64,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            mailbox_capacity: mailbox_capacity.max(1),
            subscribers: RwLock::new(HashMap::new()),
            dropped_deliveries: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, mailbox) = mpsc::channel(self.mailbox_capacity);
        let id = SubscriberId::new();

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(id, sender);
            subscribers.len()
        };

        debug!(subscriber = %id, subscribers = count, "Subscriber registered");
        Subscription { id, mailbox }
    }

    /// Removes the mailbox and drops its only sender, which closes it.
    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        if removed.is_some() {
            debug!(subscriber = %id, subscribers = count, "Subscriber removed");
        }
        removed.is_some()
    }

    /// Offers `event` once to every registered mailbox and returns how many
    /// accepted it.
    pub fn publish(&self, event: PriceUpdateEvent) -> usize {
        let subscribers = self.subscribers.read();
        let mut delivered = 0;

        for (id, mailbox) in subscribers.iter() {
            match mailbox.try_send(event) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.dropped_deliveries.fetch_add(1, Ordering::Relaxed);
                    debug!(subscriber = %id, timestamp = event.timestamp, "Mailbox full, update dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(subscriber = %id, "Mailbox receiver gone, awaiting unsubscribe");
                }
            }
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Total deliveries skipped because a mailbox was full.
    pub fn dropped_deliveries(&self) -> u64 {
        self.dropped_deliveries.load(Ordering::Relaxed)
    }

    /// Drains acquisition notifications and publishes each one, in arrival
    /// order, until `shutdown` fires or every notification sender is gone.
    pub async fn run(&self, mut notifications: NotificationReceiver, shutdown: CancellationToken) {
        info!(mailbox_capacity = self.mailbox_capacity, "📡 Starting broadcast hub");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                notification = notifications.recv() => match notification {
                    Some(event) => {
                        let delivered = self.publish(event);
                        trace!(timestamp = event.timestamp, delivered, "Published price update");
                    }
                    None => break,
                },
            }
        }

        info!("Stopping broadcast hub");
    }
}
