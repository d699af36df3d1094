//! # Backend contracts
//!
//! These traits define what a storage backend (and the outside world) must provide to the fulfilment engine.
//!
//! * [`OrderManagement`] is the authoritative record of orders, their items and their current state. It provides the
//!   per-order lock and the versioned compare-and-swap the reconciliation engine relies on.
//! * [`StockManagement`] is the append-only stock ledger and the product counters derived from it.
//! * [`ReconciliationStore`] ties the two together. It commits a state transition, its idempotency record and its
//!   stock movements in a single atomic unit, and keeps the anomaly review queue.
//! * [`PaymentGateway`] is the narrow, provider-agnostic view of the payment provider.
//! * [`Notifier`] dispatches customer notifications once a transition has been committed.
mod data_objects;
mod notifier;
mod order_management;
mod payment_gateway;
mod reconciliation_store;
mod stock_management;

pub use data_objects::{
    CasResult,
    CommitOutcome,
    InsertEventResult,
    LockedOrder,
    MovementResult,
    OrderQueryFilter,
    TransitionCommit,
};
pub use notifier::{CancellationReason, NotificationError, Notifier};
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_gateway::{
    CustomerDetails,
    GatewayError,
    GatewayStatusUpdate,
    GatewayTransaction,
    PaymentGateway,
    TransactionRequest,
};
pub use reconciliation_store::{ReconciliationStore, ReconciliationStoreError};
pub use stock_management::{StockLedgerError, StockManagement};
