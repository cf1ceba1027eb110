//! Event channel factories and handles.

use super::types::BalanceEvent;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for BalanceEvent events.
pub type BalanceEventSender = mpsc::Sender<BalanceEvent>;
/// Receiver handle for BalanceEvent events.
pub type BalanceEventReceiver = mpsc::Receiver<BalanceEvent>;

/// Create a new BalanceEvent channel.
///
/// Returns a (sender, receiver) pair. Multiple senders can be cloned from
/// the returned sender.
pub fn balance_event_channel() -> (BalanceEventSender, BalanceEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Publish without waiting. A full or closed channel drops the event with a
/// warning; balance refreshes are best effort.
pub fn publish(sender: &BalanceEventSender, event: BalanceEvent) {
    match sender.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            tracing::warn!(event = ?event, "Balance event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(event)) => {
            tracing::warn!(event = ?event, "Balance event channel closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_delivers_and_tolerates_closed_channel() {
        let (tx, mut rx) = balance_event_channel();
        let event = BalanceEvent::MerchantBalanceChanged {
            merchant_id: Uuid::nil(),
            balance: rust_decimal::Decimal::ONE,
        };
        publish(&tx, event.clone());
        assert_eq!(rx.recv().await, Some(event.clone()));

        drop(rx);
        publish(&tx, event);
    }
}
