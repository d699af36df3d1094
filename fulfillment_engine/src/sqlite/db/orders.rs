use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderState},
    traits::{CasResult, OrderQueryFilter, OrderStoreError},
};

/// Inserts a new order and its line items. This is not atomic. Embed the call in a transaction and pass `&mut *tx`
/// as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let result = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (order_id, customer_id, total_price, currency, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.customer_id)
    .bind(order.total_price)
    .bind(&order.currency)
    .bind(OrderState::Created)
    .fetch_one(&mut *conn)
    .await;
    let record = match result {
        Ok(o) => o,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(OrderStoreError::OrderAlreadyExists(order.order_id.clone()))
        },
        Err(e) => return Err(e.into()),
    };
    for item in &order.items {
        sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES ($1, $2, $3, $4)")
            .bind(&order.order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *conn)
            .await?;
    }
    trace!("🗃️ Order {} inserted with {} items", record.order_id, order.items.len());
    Ok(record)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_transaction_id(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_transaction_id = $1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, OrderStoreError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, OrderStoreError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(customer_id) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(customer_id);
    }
    if let Some(payment_id) = query.payment_transaction_id {
        where_clause.push("payment_transaction_id = ");
        where_clause.push_bind_unseparated(payment_id);
    }
    if !query.states.is_empty() {
        where_clause.push("status IN (");
        for (i, state) in query.states.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(state.to_string());
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {} orders", orders.len());
    Ok(orders)
}

/// Links a gateway transaction to an order that has none yet.
pub async fn attach_payment_transaction(
    order_id: &OrderId,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let result = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET payment_transaction_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND payment_transaction_id IS NULL
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await;
    match result {
        Ok(Some(order)) => {
            debug!("🗃️ Payment {payment_id} attached to order {order_id}");
            Ok(order)
        },
        Ok(None) => match fetch_order_by_order_id(order_id, conn).await? {
            None => Err(OrderStoreError::OrderNotFound(order_id.clone())),
            Some(o) => Err(OrderStoreError::TransactionAlreadyAttached {
                order_id: o.order_id,
                payment_id: o.payment_transaction_id.unwrap_or_default(),
            }),
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(OrderStoreError::TransactionInUse(payment_id.to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

/// The versioned write. On success the version increases by one and, if the order has no gateway transaction yet,
/// `payment_id` is attached.
pub async fn compare_and_swap(
    order_id: &OrderId,
    expected_version: i64,
    new_state: OrderState,
    payment_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<CasResult, OrderStoreError> {
    let result = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET
                status = $1,
                version = version + 1,
                payment_transaction_id = COALESCE(payment_transaction_id, $2),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $3 AND version = $4
            RETURNING *;
        "#,
    )
    .bind(new_state)
    .bind(payment_id)
    .bind(order_id)
    .bind(expected_version)
    .fetch_optional(conn)
    .await;
    match result {
        Ok(Some(order)) => {
            trace!("🗃️ Order {order_id} v{expected_version} swapped to {new_state}");
            Ok(CasResult::Swapped(order))
        },
        Ok(None) => {
            debug!("🗃️ Order {order_id} is no longer at version {expected_version}");
            Ok(CasResult::Conflict)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(OrderStoreError::TransactionInUse(payment_id.unwrap_or_default().to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_stale_orders(older_than_secs: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderStoreError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
            SELECT * FROM orders
            WHERE status IN ('Created', 'Processing')
                AND payment_transaction_id IS NOT NULL
                AND updated_at < datetime('now', $1)
            ORDER BY updated_at ASC;
        "#,
    )
    .bind(format!("-{older_than_secs} seconds"))
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
