use std::sync::Arc;

use pricefeed_models::PriceUpdateEvent;
use pricefeed_store::EventStore;
use pricefeed_stream::{BroadcastHub, SubscriberId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Timestamp assumed already delivered when there is nothing to catch up on.
pub const NO_LOWER_BOUND: i64 = 0;

/// What a stream sends before it starts following live updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStart {
    /// Replay every stored event with `timestamp >= since`.
    Since(i64),
    /// Send the most recent stored event, if there is one.
    Latest,
    /// Skip history entirely.
    LiveOnly,
}

/// One client's stream: historical catch-up from the store, then live
/// updates from the hub.
///
/// Every emitted event has a strictly greater timestamp than the one before,
/// which hides the window between the replay snapshot and subscribing. The
/// session ends when `cancel` fires, the mailbox is closed, or the outbound
/// channel is gone; on every exit path it cancels `cancel`, which makes the
/// watcher task unsubscribe the mailbox.
pub struct StreamSession {
    store: Arc<dyn EventStore>,
    hub: Arc<BroadcastHub>,
    start: StreamStart,
    cancel: CancellationToken,
}

impl StreamSession {
    pub fn new(
        store: Arc<dyn EventStore>,
        hub: Arc<BroadcastHub>,
        start: StreamStart,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            hub,
            start,
            cancel,
        }
    }

    pub async fn run(self, out: mpsc::Sender<PriceUpdateEvent>) {
        self.stream(&out).await;
        self.cancel.cancel();
    }

    async fn stream(&self, out: &mpsc::Sender<PriceUpdateEvent>) {
        let Some(mut last_sent) = self.catch_up(out).await else {
            return;
        };

        let mut subscription = self.hub.subscribe();
        let id = subscription.id();
        tokio::spawn(unsubscribe_on_cancel(self.hub.clone(), id, self.cancel.clone()));

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = subscription.recv() => received,
            };

            let Some(event) = received else {
                debug!(subscriber = %id, "Mailbox closed, ending stream");
                break;
            };

            if event.timestamp <= last_sent {
                trace!(subscriber = %id, timestamp = event.timestamp, "Skipping already delivered update");
                continue;
            }

            if !self.emit(out, event).await {
                break;
            }
            last_sent = event.timestamp;
        }
    }

    /// Replays history (or the latest event) and returns the highest
    /// timestamp covered, or `None` if the client went away meanwhile.
    async fn catch_up(&self, out: &mpsc::Sender<PriceUpdateEvent>) -> Option<i64> {
        match self.start {
            StreamStart::Since(since) => {
                let events = self.store.events_since(since).await;
                debug!(since, count = events.len(), "Loaded historical events");

                let mut last_sent = since;
                for event in events {
                    if !self.emit(out, event).await {
                        return None;
                    }
                    last_sent = last_sent.max(event.timestamp);
                }
                Some(last_sent)
            }
            StreamStart::Latest => match self.store.latest_event().await {
                Some(event) => self.emit(out, event).await.then_some(event.timestamp),
                None => Some(NO_LOWER_BOUND),
            },
            StreamStart::LiveOnly => Some(NO_LOWER_BOUND),
        }
    }

    async fn emit(&self, out: &mpsc::Sender<PriceUpdateEvent>, event: PriceUpdateEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = out.send(event) => {
                if sent.is_err() {
                    debug!(timestamp = event.timestamp, "Client went away, ending stream");
                }
                sent.is_ok()
            }
        }
    }
}

async fn unsubscribe_on_cancel(hub: Arc<BroadcastHub>, id: SubscriberId, cancel: CancellationToken) {
    cancel.cancelled().await;
    hub.unsubscribe(id);
}
