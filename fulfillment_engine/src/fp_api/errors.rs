use thiserror::Error;

use crate::traits::{GatewayError, OrderStoreError, ReconciliationStoreError, StockLedgerError};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),
    #[error("Order {0} not found")]
    OrderNotFound(String),
    #[error("Invalid query. {0}")]
    QueryError(String),
}

impl From<ReconciliationStoreError> for ReconciliationError {
    fn from(e: ReconciliationStoreError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<OrderStoreError> for ReconciliationError {
    fn from(e: OrderStoreError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<StockLedgerError> for ReconciliationError {
    fn from(e: StockLedgerError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    OrderError(#[from] OrderStoreError),
    #[error("{0}")]
    GatewayError(#[from] GatewayError),
    #[error("The payment request does not match the order. {0}")]
    InconsistentRequest(String),
}
