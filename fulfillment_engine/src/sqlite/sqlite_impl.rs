//! `SqliteDatabase` is a concrete implementation of a fulfilment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{
    db::{anomalies, db_url, new_pool, orders, payment_events, stock},
    SqliteDatabaseError,
};
use crate::{
    db_types::{
        sum_quantities,
        Anomaly,
        NewAnomaly,
        NewOrder,
        NewPaymentEvent,
        NewProduct,
        NewStockMovement,
        Order,
        OrderId,
        OrderItem,
        OrderState,
        PaymentEvent,
        Product,
        StockDirection,
        StockDrift,
        StockMovement,
    },
    helpers::OrderLocks,
    order_state::StockEffect,
    traits::{
        CasResult,
        CommitOutcome,
        InsertEventResult,
        LockedOrder,
        MovementResult,
        OrderManagement,
        OrderQueryFilter,
        OrderStoreError,
        ReconciliationStore,
        ReconciliationStoreError,
        StockLedgerError,
        StockManagement,
        TransitionCommit,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    locks: OrderLocks,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn create_order(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        if order.items.is_empty() {
            return Err(OrderStoreError::InvalidOrder(format!("Order {} has no items", order.order_id)));
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
            return Err(OrderStoreError::InvalidOrder(format!(
                "Item {} in order {} has quantity {}",
                item.product_id, order.order_id, item.quantity
            )));
        }
        if let Some(item) = order.items.iter().find(|i| i.unit_price.value() < 0) {
            return Err(OrderStoreError::InvalidOrder(format!(
                "Item {} in order {} has unit price {}",
                item.product_id, order.order_id, item.unit_price
            )));
        }
        order.quantities_by_product().map_err(|e| OrderStoreError::InvalidOrder(e.to_string()))?;
        let mut tx = self.pool.begin().await?;
        let product_ids = order.items.iter().map(|i| i.product_id.as_str()).collect::<Vec<_>>();
        let missing = stock::missing_products(&product_ids, &mut tx).await.map_err(|e| match e {
            StockLedgerError::DatabaseError(s) => OrderStoreError::DatabaseError(s),
            e => OrderStoreError::DatabaseError(e.to_string()),
        })?;
        if !missing.is_empty() {
            return Err(OrderStoreError::UnknownProducts(missing.join(", ")));
        }
        let record = orders::insert_order(&order, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} created for customer {} ({})", record.order_id, record.customer_id, record.total_price);
        Ok(record)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn fetch_order_for_transaction(&self, payment_id: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_transaction_id(payment_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders(query, &mut conn).await
    }

    async fn attach_payment_transaction(&self, order_id: &OrderId, payment_id: &str) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::attach_payment_transaction(order_id, payment_id, &mut conn).await
    }

    async fn load_for_update(&self, order_id: &OrderId) -> Result<LockedOrder, OrderStoreError> {
        let guard = self.locks.lock(order_id).await;
        let order = self.fetch_order(order_id).await?.ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))?;
        Ok(LockedOrder::new(order, guard))
    }

    async fn compare_and_swap(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        new_state: OrderState,
    ) -> Result<CasResult, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::compare_and_swap(order_id, expected_version, new_state, None, &mut conn).await
    }
}

impl StockManagement for SqliteDatabase {
    async fn apply_movement(&self, movement: NewStockMovement) -> Result<MovementResult, StockLedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = stock::apply_movement(movement, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn movements_for_order(&self, order_id: &OrderId) -> Result<Vec<StockMovement>, StockLedgerError> {
        let mut conn = self.pool.acquire().await?;
        stock::movements_for_order(order_id, &mut conn).await
    }

    async fn product(&self, product_id: &str) -> Result<Option<Product>, StockLedgerError> {
        let mut conn = self.pool.acquire().await?;
        stock::fetch_product(product_id, &mut conn).await
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<Product, StockLedgerError> {
        if product.initial_stock < 0 {
            return Err(StockLedgerError::InvalidQuantity(product.initial_stock));
        }
        let mut tx = self.pool.begin().await?;
        let (record, is_new) = stock::insert_or_rename_product(&product, &mut tx).await?;
        let record = if is_new && product.initial_stock > 0 {
            let opening = NewStockMovement::restock(product.product_id.clone(), product.initial_stock);
            stock::apply_movement(opening, &mut tx).await?;
            stock::fetch_product(&product.product_id, &mut tx)
                .await?
                .ok_or_else(|| StockLedgerError::ProductNotFound(product.product_id.clone()))?
        } else {
            record
        };
        tx.commit().await?;
        Ok(record)
    }

    async fn restock(&self, product_id: &str, quantity: i64) -> Result<Product, StockLedgerError> {
        let mut tx = self.pool.begin().await?;
        stock::apply_movement(NewStockMovement::restock(product_id.to_string(), quantity), &mut tx).await?;
        let product = stock::fetch_product(product_id, &mut tx)
            .await?
            .ok_or_else(|| StockLedgerError::ProductNotFound(product_id.to_string()))?;
        tx.commit().await?;
        info!("📦️ {product_id} restocked with {quantity} units. {} in stock", product.stock);
        Ok(product)
    }

    async fn audit_stock(&self) -> Result<Vec<StockDrift>, StockLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let drift = stock::audit_stock(&mut conn).await?;
        for d in &drift {
            warn!("📦️ Stock drift for {}. Counter is {}, ledger says {}", d.product_id, d.counter, d.ledger_balance);
        }
        Ok(drift)
    }
}

impl ReconciliationStore for SqliteDatabase {
    async fn payment_event_exists(
        &self,
        transaction_id: &str,
        provider_status: &str,
    ) -> Result<bool, ReconciliationStoreError> {
        let mut conn = self.pool.acquire().await?;
        payment_events::event_exists(transaction_id, provider_status, &mut conn).await
    }

    async fn fetch_payment_events_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentEvent>, ReconciliationStoreError> {
        let mut conn = self.pool.acquire().await?;
        payment_events::events_for_order(order_id, &mut conn).await
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<CommitOutcome, ReconciliationStoreError> {
        let mut tx = self.pool.begin().await?;
        // The versioned write goes first, so that the transaction holds the write lock from its first statement.
        let cas = orders::compare_and_swap(
            &commit.order_id,
            commit.expected_version,
            commit.new_state,
            Some(commit.payment_id.as_str()),
            &mut tx,
        )
        .await?;
        let order = match cas {
            CasResult::Swapped(order) => order,
            CasResult::Conflict => {
                tx.rollback().await?;
                return Ok(CommitOutcome::Conflict);
            },
        };
        let event = NewPaymentEvent {
            transaction_id: commit.payment_id.clone(),
            provider_status: commit.provider_status.clone(),
            order_id: commit.order_id.clone(),
            resulting_state: commit.new_state,
            payload_hash: commit.payload_hash.clone(),
        };
        if payment_events::insert_payment_event(event, &mut tx).await? == InsertEventResult::AlreadyExists {
            tx.rollback().await?;
            return Ok(CommitOutcome::DuplicateEvent);
        }
        let planned = match commit.stock_effect {
            StockEffect::None => Vec::new(),
            StockEffect::Decrement => {
                let items = orders::fetch_order_items(&commit.order_id, &mut tx).await?;
                sum_quantities(items.iter().map(|i| (i.product_id.as_str(), i.quantity)))
                    .map_err(|e| ReconciliationStoreError::DatabaseError(e.to_string()))?
                    .into_iter()
                    .map(|(product_id, qty)| NewStockMovement::sale(commit.order_id.clone(), product_id, qty))
                    .collect()
            },
            StockEffect::Reverse => stock::movements_for_order(&commit.order_id, &mut tx)
                .await?
                .into_iter()
                .filter(|m| m.direction == StockDirection::Decrement)
                .map(|m| NewStockMovement::reversal(commit.order_id.clone(), m.product_id, m.quantity))
                .collect(),
        };
        let mut movements = Vec::with_capacity(planned.len());
        for movement in planned {
            // Any error here drops `tx`, which rolls back the state change and the payment event too.
            match stock::apply_movement(movement, &mut tx).await? {
                MovementResult::Applied(m) => movements.push(m),
                MovementResult::AlreadyApplied(m) => {
                    warn!("📦️ {} of {} for order {} was already applied", m.direction, m.product_id, commit.order_id)
                },
            }
        }
        tx.commit().await?;
        debug!(
            "🗃️ Order {} committed as {} (v{}) with {} stock movements",
            order.order_id,
            order.status,
            order.version,
            movements.len()
        );
        Ok(CommitOutcome::Committed { order, movements })
    }

    async fn record_payment_event(&self, event: NewPaymentEvent) -> Result<InsertEventResult, ReconciliationStoreError> {
        let mut conn = self.pool.acquire().await?;
        payment_events::insert_payment_event(event, &mut conn).await
    }

    async fn record_anomaly(&self, anomaly: NewAnomaly) -> Result<Anomaly, ReconciliationStoreError> {
        let mut conn = self.pool.acquire().await?;
        anomalies::upsert_anomaly(anomaly, &mut conn).await
    }

    async fn fetch_anomalies(&self) -> Result<Vec<Anomaly>, ReconciliationStoreError> {
        let mut conn = self.pool.acquire().await?;
        anomalies::fetch_anomalies(&mut conn).await
    }

    async fn fetch_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, ReconciliationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_stale_orders(older_than.num_seconds(), &mut conn).await?;
        Ok(orders)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, locks: OrderLocks::new() })
    }

    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}
