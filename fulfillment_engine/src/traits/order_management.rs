use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderState},
    traits::{CasResult, LockedOrder, OrderQueryFilter},
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is already linked to payment {payment_id}")]
    TransactionAlreadyAttached { order_id: OrderId, payment_id: String },
    #[error("Payment {0} is already linked to another order")]
    TransactionInUse(String),
    #[error("The order refers to products that are not in the catalog: {0}")]
    UnknownProducts(String),
    #[error("Invalid order. {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// The authoritative record of orders.
///
/// After checkout has created an order, its state is only ever changed by the reconciliation engine, using
/// [`OrderManagement::load_for_update`] followed by a versioned write.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Inserts the order and its items in a single transaction. The order starts in `Created` with version 0.
    async fn create_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderStoreError>;

    /// Fetches the order the given gateway transaction has been attached to.
    async fn fetch_order_for_transaction(&self, payment_id: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Orders matching the filter, oldest first. An empty filter returns every order.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;

    /// Links a gateway transaction to an order. This only succeeds while the order has no transaction yet.
    async fn attach_payment_transaction(&self, order_id: &OrderId, payment_id: &str) -> Result<Order, OrderStoreError>;

    /// Acquires the per-order lock and then reads the order. Orders that do not exist return `OrderNotFound`.
    async fn load_for_update(&self, order_id: &OrderId) -> Result<LockedOrder, OrderStoreError>;

    /// Sets the order state if, and only if, the stored version equals `expected_version`. The version is bumped by
    /// one on success.
    async fn compare_and_swap(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        new_state: OrderState,
    ) -> Result<CasResult, OrderStoreError>;
}
