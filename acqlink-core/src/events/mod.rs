//! Event system.
//!
//! # Event Flow
//!
//! 1. Webhook processing emits `BalanceRefreshRequested` when a transaction
//!    balance is still unknown -> `BalanceUpdater` queries the gateway
//! 2. A gateway query that reports a balance emits `MerchantBalanceChanged`
//!    -> `BalanceUpdater` writes the merchant balance
//!
//! Events are idempotent and ephemeral.

pub mod channels;
pub mod types;

pub use channels::{
    BalanceEventReceiver, BalanceEventSender, DEFAULT_CHANNEL_BUFFER, balance_event_channel,
    publish,
};
pub use types::BalanceEvent;
