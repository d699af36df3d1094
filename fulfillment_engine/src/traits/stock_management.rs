use thiserror::Error;

use crate::{
    db_types::{NewProduct, NewStockMovement, OrderId, Product, StockDrift, StockMovement},
    traits::MovementResult,
};

#[derive(Debug, Clone, Error)]
pub enum StockLedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(String),
    #[error("Insufficient stock for {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: String, requested: i64, available: i64 },
    #[error("Stock movements must have a positive quantity, not {0}")]
    InvalidQuantity(i64),
}

impl From<sqlx::Error> for StockLedgerError {
    fn from(e: sqlx::Error) -> Self {
        StockLedgerError::DatabaseError(e.to_string())
    }
}

/// The stock ledger. Movements are never updated or deleted, and the product counter only changes together with a
/// new ledger row.
#[allow(async_fn_in_trait)]
pub trait StockManagement {
    /// Appends a movement and adjusts the product counter, atomically.
    ///
    /// Order-linked movements are idempotent on `(order_id, product_id, direction)`: if such a movement exists, it is
    /// returned as [`MovementResult::AlreadyApplied`] and nothing changes. A decrement that would take the counter
    /// below zero fails with [`StockLedgerError::InsufficientStock`].
    async fn apply_movement(&self, movement: NewStockMovement) -> Result<MovementResult, StockLedgerError>;

    async fn movements_for_order(&self, order_id: &OrderId) -> Result<Vec<StockMovement>, StockLedgerError>;

    async fn product(&self, product_id: &str) -> Result<Option<Product>, StockLedgerError>;

    /// Inserts a product, or renames an existing one. The opening balance is only written for new products, as a
    /// `Restock` movement.
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, StockLedgerError>;

    async fn restock(&self, product_id: &str, quantity: i64) -> Result<Product, StockLedgerError>;

    /// Recomputes every product's ledger balance and returns the products whose counter disagrees with it.
    async fn audit_stock(&self) -> Result<Vec<StockDrift>, StockLedgerError>;
}
