//! Event type definitions.
//!
//! Events carry identifiers and the one value that triggered them; the
//! consumer re-reads anything else it needs from the stores.

use rust_decimal::Decimal;
use uuid::Uuid;

/// Balance-related events consumed by the `BalanceUpdater`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceEvent {
    /// A transaction was updated from a webhook but its balance is still
    /// unknown. The consumer queries the gateway to fill it in.
    BalanceRefreshRequested {
        transaction_id: Uuid,
        merchant_id: Uuid,
    },
    /// The gateway reported the merchant's balance.
    MerchantBalanceChanged { merchant_id: Uuid, balance: Decimal },
}
