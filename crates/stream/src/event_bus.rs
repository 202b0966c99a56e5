// Single-slot notification channel between acquisition and the hub driver

use pricefeed_models::PriceUpdateEvent;
use tokio::sync::mpsc;

/// Depth of the acquisition-to-hub channel. A notification that finds the
/// slot occupied is dropped by the sender.
pub const NOTIFICATION_SLOTS: usize = 1;

pub type NotificationSender = mpsc::Sender<PriceUpdateEvent>;
pub type NotificationReceiver = mpsc::Receiver<PriceUpdateEvent>;

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(NOTIFICATION_SLOTS)
}
