use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{Anomaly, NewAnomaly, NewPaymentEvent, Order, OrderId, PaymentEvent},
    traits::{CommitOutcome, InsertEventResult, OrderManagement, OrderStoreError, StockLedgerError, StockManagement, TransitionCommit},
};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Product {0} does not exist")]
    ProductNotFound(String),
    #[error("Insufficient stock for {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: String, requested: i64, available: i64 },
    #[error("{0}")]
    OrderStore(#[from] OrderStoreError),
}

impl From<sqlx::Error> for ReconciliationStoreError {
    fn from(e: sqlx::Error) -> Self {
        ReconciliationStoreError::DatabaseError(e.to_string())
    }
}

impl From<StockLedgerError> for ReconciliationStoreError {
    fn from(e: StockLedgerError) -> Self {
        match e {
            StockLedgerError::InsufficientStock { product_id, requested, available } => {
                Self::InsufficientStock { product_id, requested, available }
            },
            StockLedgerError::ProductNotFound(p) => Self::ProductNotFound(p),
            StockLedgerError::DatabaseError(s) => Self::DatabaseError(s),
            StockLedgerError::InvalidQuantity(q) => Self::DatabaseError(format!("Invalid stock quantity {q}")),
        }
    }
}

/// The storage side of reconciliation.
#[allow(async_fn_in_trait)]
pub trait ReconciliationStore: OrderManagement + StockManagement {
    async fn payment_event_exists(&self, transaction_id: &str, provider_status: &str)
        -> Result<bool, ReconciliationStoreError>;

    async fn fetch_payment_events_for_order(&self, order_id: &OrderId)
        -> Result<Vec<PaymentEvent>, ReconciliationStoreError>;

    /// Commits a transition in one database transaction:
    /// * the compare-and-swap on the order version (attaching the payment id if the order has none),
    /// * the payment event,
    /// * the stock movements implied by `stock_effect`.
    ///
    /// If any step fails, nothing is written.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<CommitOutcome, ReconciliationStoreError>;

    /// Records a payment event without touching the order. Used when the gateway re-signals the current state.
    async fn record_payment_event(&self, event: NewPaymentEvent) -> Result<InsertEventResult, ReconciliationStoreError>;

    /// Adds an anomaly to the review queue. A repeat of the same anomaly bumps its occurrence count.
    async fn record_anomaly(&self, anomaly: NewAnomaly) -> Result<Anomaly, ReconciliationStoreError>;

    /// The review queue, most recently seen first.
    async fn fetch_anomalies(&self) -> Result<Vec<Anomaly>, ReconciliationStoreError>;

    /// Orders in `Created` or `Processing` that have a gateway transaction and have not changed for `older_than`.
    async fn fetch_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, ReconciliationStoreError>;
}
