use fpg_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The provider refused the request. Retrying will not help.
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
    /// Timeouts, 5xx and rate limiting.
    #[error("The payment gateway is temporarily unavailable. {0}")]
    Transient(String),
    /// The provider answered, but not with anything we understand.
    #[error("The payment gateway response could not be parsed. {0}")]
    Malformed(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// The provider's authoritative view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub payment_id: String,
    pub merchant_order_id: Option<OrderId>,
    /// The raw status code, as the provider reported it
    pub status_code: String,
    pub amount: Option<Cents>,
}

/// The provider's immediate answer to a capture or void. Nothing local changes until the transaction is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatusUpdate {
    pub payment_id: String,
    pub status_code: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub order_id: OrderId,
    pub amount: Cents,
    pub customer: CustomerDetails,
    /// Provider-specific payment method details (card, boleto, pix, ...). Passed through to the gateway as is.
    pub payment_method: serde_json::Value,
}

#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn create_transaction(&self, request: TransactionRequest) -> Result<GatewayTransaction, GatewayError>;

    async fn get_transaction(&self, payment_id: &str) -> Result<GatewayTransaction, GatewayError>;

    /// The payment ids the provider holds for a merchant order, in the order the provider lists them.
    async fn find_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, GatewayError>;

    /// Captures an authorized payment. `None` captures the full authorized amount.
    async fn capture(&self, payment_id: &str, amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError>;

    /// Voids a payment, fully or partially.
    async fn void(&self, payment_id: &str, amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError>;
}
