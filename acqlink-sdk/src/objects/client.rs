//! Client (cardholder) records as the gateway stores them.
//!
//! The same shape is embedded in placement requests and returned by the
//! client endpoints. Fields flagged as gateway-owned are filled in by the
//! gateway and must stay unset on outbound requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of cards the gateway accepts per client.
pub const MAX_CARDS_PER_CLIENT: usize = 3;

/// Reasons a client or placement request is refused before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("clientId cannot be blank")]
    BlankClientId,

    #[error("clientId mismatch ({request} and {client})")]
    ClientIdMismatch { request: String, client: String },

    #[error("{0} cannot be set")]
    GatewayOwnedField(&'static str),

    #[error("max 3 cards allowed")]
    TooManyCards,

    #[error("client is not valid ({0})")]
    Client(Box<ValidationError>),

    #[error("billingAddress is not valid ({0})")]
    BillingAddress(Box<ValidationError>),

    #[error("card is not valid ({0})")]
    Card(Box<ValidationError>),
}

fn reject_if_set<T>(value: &Option<T>, field: &'static str) -> Result<(), ValidationError> {
    match value {
        Some(_) => Err(ValidationError::GatewayOwnedField(field)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    /// The client's reference in the merchant's own system.
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(rename = "merchantID", skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CardDetails>>,

    // Gateway-owned.
    /// The client's id inside the gateway.
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlated_black: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(rename = "created", skip_serializing_if = "Option::is_none")]
    pub created_in_gateway: Option<String>,
    #[serde(rename = "updated", skip_serializing_if = "Option::is_none")]
    pub updated_in_gateway: Option<String>,
    #[serde(rename = "valid", skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

impl ClientDetails {
    /// Check that the record can be embedded in an outbound request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        reject_if_set(&self.is_valid, "isValid")?;
        reject_if_set(&self.black, "black")?;
        reject_if_set(&self.correlated_black, "correlatedBlack")?;
        reject_if_set(&self.created_in_gateway, "createdInGateway")?;
        reject_if_set(&self.updated_in_gateway, "updatedInGateway")?;
        reject_if_set(&self.gateway_id, "idInGateway")?;
        if self.client_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
            return Err(ValidationError::BlankClientId);
        }
        if let Some(cards) = &self.cards {
            if cards.len() > MAX_CARDS_PER_CLIENT {
                return Err(ValidationError::TooManyCards);
            }
            for card in cards {
                card.validate()
                    .map_err(|e| ValidationError::Card(Box::new(e)))?;
            }
        }
        if let Some(address) = &self.billing_address {
            address
                .validate()
                .map_err(|e| ValidationError::BillingAddress(Box::new(e)))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    /// Street type, e.g. `St` or `Rd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "valid", skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

impl BillingAddress {
    pub fn validate(&self) -> Result<(), ValidationError> {
        reject_if_set(&self.is_valid, "isValid")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    /// Masked card number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    /// `MM/YY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_year: Option<String>,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(rename = "valid", skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

impl CardDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        reject_if_set(&self.is_valid, "isValid")?;
        reject_if_set(&self.expiry_month, "expiryMonth")?;
        reject_if_set(&self.expiry_year, "expiryYear")
    }
}
