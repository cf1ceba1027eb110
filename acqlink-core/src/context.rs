//! Per-request merchant context.
//!
//! A [`RequestContext`] is built for every lease or inbound request and
//! passed by reference to the services that need it. Nothing is stored in
//! thread-local or task-local state; dropping the value is the cleanup.

use acqlink_sdk::config::GatewayConfig;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::entities::Environment;
use crate::entities::merchant::Merchant;
use crate::entities::payment_transaction::PaymentTransaction;
use crate::framework::{MerchantStore, StoreError};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("transaction {0} has no merchant")]
    NoMerchant(Uuid),

    #[error("merchant {0} not found")]
    MerchantNotFound(Uuid),

    #[error("merchant {0} is not active")]
    MerchantInactive(Uuid),

    #[error("merchant {merchant_id} has no gateway URL configured for mode {environment}")]
    MissingGatewayUrl {
        merchant_id: Uuid,
        environment: Environment,
    },

    #[error("merchant {merchant_id} has no gateway merchant ID configured for mode {environment}")]
    MissingGatewayMid {
        merchant_id: Uuid,
        environment: Environment,
    },

    #[error("merchant {merchant_id} has no gateway merchant key configured for mode {environment}")]
    MissingGatewayKey {
        merchant_id: Uuid,
        environment: Environment,
    },

    #[error("merchant {merchant_id} has an invalid gateway URL: {source}")]
    InvalidGatewayUrl {
        merchant_id: Uuid,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolved merchant plus the gateway credentials for one environment.
#[derive(Debug, Clone)]
pub struct MerchantContext {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub environment: Environment,
    pub gateway: GatewayConfig,
}

impl MerchantContext {
    /// Validate the merchant and pick credentials for `environment`.
    pub fn for_merchant(merchant: &Merchant, environment: Environment) -> Result<Self, ContextError> {
        if !merchant.is_active() {
            return Err(ContextError::MerchantInactive(merchant.id));
        }
        let credentials = merchant.credentials(environment);
        let url = credentials.url.ok_or(ContextError::MissingGatewayUrl {
            merchant_id: merchant.id,
            environment,
        })?;
        let mid = credentials.mid.ok_or(ContextError::MissingGatewayMid {
            merchant_id: merchant.id,
            environment,
        })?;
        let key = credentials.key.ok_or(ContextError::MissingGatewayKey {
            merchant_id: merchant.id,
            environment,
        })?;
        let base_url = Url::parse(url).map_err(|source| ContextError::InvalidGatewayUrl {
            merchant_id: merchant.id,
            source,
        })?;

        let mut gateway = GatewayConfig::new(base_url, mid, key);
        if let Some(api_key) = credentials.api_key {
            gateway = gateway.with_api_key(api_key);
        }
        Ok(Self {
            merchant_id: merchant.id,
            merchant_name: merchant.name.clone(),
            environment,
            gateway,
        })
    }

    /// Credentials carrying the transaction's callback URLs.
    pub fn gateway_for(&self, transaction: &PaymentTransaction) -> GatewayConfig {
        let mut gateway = self.gateway.clone();
        gateway.reply_url = transaction.reply_url.clone();
        gateway.backoffice_url = transaction.backoffice_url.clone();
        gateway
    }
}

/// Who is acting, and on behalf of which merchant.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub merchant: MerchantContext,
    /// Free-form actor label for logs, e.g. `task:query-payment-status`.
    pub initiator: String,
}

impl RequestContext {
    pub fn can_access(&self, transaction: &PaymentTransaction) -> bool {
        transaction.belongs_to(self.merchant.merchant_id)
    }

    /// Build the context for acting on `transaction`.
    ///
    /// The environment is the transaction's pinned one when set, otherwise
    /// the merchant's current mode.
    pub async fn for_transaction<M>(
        merchants: &M,
        transaction: &PaymentTransaction,
        initiator: impl Into<String>,
    ) -> Result<Self, ContextError>
    where
        M: MerchantStore + ?Sized,
    {
        let merchant_id = transaction
            .merchant_id
            .ok_or(ContextError::NoMerchant(transaction.id))?;
        let merchant = merchants
            .find_merchant(merchant_id)
            .await?
            .ok_or(ContextError::MerchantNotFound(merchant_id))?;
        let environment = transaction.environment.unwrap_or(merchant.mode);
        Ok(Self {
            merchant: MerchantContext::for_merchant(&merchant, environment)?,
            initiator: initiator.into(),
        })
    }

    /// Context in the merchant's current mode.
    pub fn for_merchant(merchant: &Merchant, initiator: impl Into<String>) -> Result<Self, ContextError> {
        Ok(Self {
            merchant: MerchantContext::for_merchant(merchant, merchant.mode)?,
            initiator: initiator.into(),
        })
    }
}
