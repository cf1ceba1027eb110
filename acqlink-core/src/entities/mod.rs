pub mod merchant;
pub mod payment_transaction;
pub mod pull_task;

use acqlink_sdk::objects::{CardType as SdkCardType, GatewayOutcome};

/// Lifecycle of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "transaction_status")]
pub enum TransactionStatus {
    Received,
    Pending,
    AwaitingCallback,
    QuerySuccess,
    Success,
    Failed,
    Cancelled,
    Refunded,
    Abandoned,
}

impl TransactionStatus {
    /// Terminal statuses are never changed again by reconciliation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Success
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
                | TransactionStatus::Refunded
                | TransactionStatus::Abandoned
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Received => write!(f, "RECEIVED"),
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::AwaitingCallback => write!(f, "AWAITING_CALLBACK"),
            TransactionStatus::QuerySuccess => write!(f, "QUERY_SUCCESS"),
            TransactionStatus::Success => write!(f, "SUCCESS"),
            TransactionStatus::Failed => write!(f, "FAILED"),
            TransactionStatus::Cancelled => write!(f, "CANCELLED"),
            TransactionStatus::Refunded => write!(f, "REFUNDED"),
            TransactionStatus::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

impl From<GatewayOutcome> for TransactionStatus {
    fn from(value: GatewayOutcome) -> Self {
        match value {
            GatewayOutcome::Success => TransactionStatus::Success,
            GatewayOutcome::Pending => TransactionStatus::Pending,
            GatewayOutcome::Abandoned => TransactionStatus::Abandoned,
            GatewayOutcome::Failed => TransactionStatus::Failed,
        }
    }
}

/// Gateway environment a merchant or transaction talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "gateway_environment")]
pub enum Environment {
    Test,
    Live,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "TEST"),
            Environment::Live => write!(f, "LIVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "merchant_status")]
pub enum MerchantStatus {
    Active,
    Inactive,
    Suspended,
}

impl std::fmt::Display for MerchantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MerchantStatus::Active => write!(f, "ACTIVE"),
            MerchantStatus::Inactive => write!(f, "INACTIVE"),
            MerchantStatus::Suspended => write!(f, "SUSPENDED"),
        }
    }
}

/// Payment brand for database operations.
///
/// This is the sqlx::Type version. For the wire form, see
/// `acqlink_sdk::objects::CardType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "payment_brand")]
pub enum PaymentBrand {
    UnionPay,
    WechatPay,
    Alipay,
}

impl From<PaymentBrand> for SdkCardType {
    fn from(value: PaymentBrand) -> Self {
        match value {
            PaymentBrand::UnionPay => SdkCardType::UnionPay,
            PaymentBrand::WechatPay => SdkCardType::WechatPay,
            PaymentBrand::Alipay => SdkCardType::Alipay,
        }
    }
}

impl From<SdkCardType> for PaymentBrand {
    fn from(value: SdkCardType) -> Self {
        match value {
            SdkCardType::UnionPay => PaymentBrand::UnionPay,
            SdkCardType::WechatPay => PaymentBrand::WechatPay,
            SdkCardType::Alipay => PaymentBrand::Alipay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        use TransactionStatus::*;
        for status in [Success, Failed, Cancelled, Refunded, Abandoned] {
            assert!(status.is_terminal(), "{status}");
        }
        for status in [Received, Pending, AwaitingCallback, QuerySuccess] {
            assert!(!status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn gateway_outcome_maps_to_status() {
        assert_eq!(
            TransactionStatus::from(GatewayOutcome::Abandoned),
            TransactionStatus::Abandoned
        );
        assert_eq!(
            TransactionStatus::from(GatewayOutcome::Failed),
            TransactionStatus::Failed
        );
    }
}
