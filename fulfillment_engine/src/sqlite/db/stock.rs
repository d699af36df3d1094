use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, NewStockMovement, OrderId, Product, StockDirection, StockDrift, StockMovement},
    traits::{MovementResult, StockLedgerError},
};

pub async fn fetch_product(product_id: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, StockLedgerError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Returns the ids in `product_ids` that are not in the catalog.
pub async fn missing_products(
    product_ids: &[&str],
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, StockLedgerError> {
    let mut missing = Vec::new();
    for id in product_ids {
        if fetch_product(id, &mut *conn).await?.is_none() {
            missing.push(id.to_string());
        }
    }
    Ok(missing)
}

/// Inserts a product with an empty counter, or renames it if it exists. Returns the product and whether it was new.
pub async fn insert_or_rename_product(
    product: &NewProduct,
    conn: &mut SqliteConnection,
) -> Result<(Product, bool), StockLedgerError> {
    if let Some(existing) = fetch_product(&product.product_id, &mut *conn).await? {
        if existing.name == product.name {
            return Ok((existing, false));
        }
        let renamed = sqlx::query_as::<_, Product>(
            "UPDATE products SET name = $1, updated_at = CURRENT_TIMESTAMP WHERE product_id = $2 RETURNING *",
        )
        .bind(&product.name)
        .bind(&product.product_id)
        .fetch_one(conn)
        .await?;
        return Ok((renamed, false));
    }
    let inserted = sqlx::query_as::<_, Product>("INSERT INTO products (product_id, name, stock) VALUES ($1, $2, 0) RETURNING *")
        .bind(&product.product_id)
        .bind(&product.name)
        .fetch_one(conn)
        .await?;
    debug!("📦️ Product {} added to the catalog", inserted.product_id);
    Ok((inserted, true))
}

pub async fn find_order_movement(
    order_id: &OrderId,
    product_id: &str,
    direction: StockDirection,
    conn: &mut SqliteConnection,
) -> Result<Option<StockMovement>, StockLedgerError> {
    let movement = sqlx::query_as::<_, StockMovement>(
        "SELECT * FROM stock_movements WHERE order_id = $1 AND product_id = $2 AND direction = $3",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(direction)
    .fetch_optional(conn)
    .await?;
    Ok(movement)
}

/// Appends a movement to the ledger and applies it to the product counter. This is not atomic: if the counter update
/// fails, the movement row has already been written. Always call this inside a transaction.
pub async fn apply_movement(
    movement: NewStockMovement,
    conn: &mut SqliteConnection,
) -> Result<MovementResult, StockLedgerError> {
    if movement.quantity <= 0 {
        return Err(StockLedgerError::InvalidQuantity(movement.quantity));
    }
    if let Some(order_id) = &movement.order_id {
        if let Some(existing) =
            find_order_movement(order_id, &movement.product_id, movement.direction, &mut *conn).await?
        {
            debug!(
                "📦️ {} of {} for order {order_id} is already in the ledger",
                movement.direction, movement.product_id
            );
            return Ok(MovementResult::AlreadyApplied(existing));
        }
    }
    if fetch_product(&movement.product_id, &mut *conn).await?.is_none() {
        return Err(StockLedgerError::ProductNotFound(movement.product_id));
    }
    let inserted = sqlx::query_as::<_, StockMovement>(
        r#"
            INSERT INTO stock_movements (order_id, product_id, direction, quantity, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&movement.order_id)
    .bind(&movement.product_id)
    .bind(movement.direction)
    .bind(movement.quantity)
    .bind(movement.reason)
    .fetch_one(&mut *conn)
    .await;
    let inserted = match (inserted, &movement.order_id) {
        (Ok(m), _) => m,
        (Err(sqlx::Error::Database(e)), Some(order_id)) if e.is_unique_violation() => {
            // Someone else got there between the check and the insert
            let existing = find_order_movement(order_id, &movement.product_id, movement.direction, &mut *conn)
                .await?
                .ok_or_else(|| StockLedgerError::DatabaseError(format!("Movement for {order_id} vanished")))?;
            return Ok(MovementResult::AlreadyApplied(existing));
        },
        (Err(e), _) => return Err(e.into()),
    };
    let rows = match movement.direction {
        StockDirection::Decrement => sqlx::query(
            r#"
                UPDATE products SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP
                WHERE product_id = $2 AND stock >= $1
            "#,
        ),
        StockDirection::Increment => sqlx::query(
            "UPDATE products SET stock = stock + $1, updated_at = CURRENT_TIMESTAMP WHERE product_id = $2",
        ),
    }
    .bind(movement.quantity)
    .bind(&movement.product_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if rows == 0 {
        let available = fetch_product(&movement.product_id, &mut *conn).await?.map(|p| p.stock).unwrap_or(0);
        return Err(StockLedgerError::InsufficientStock {
            product_id: movement.product_id,
            requested: movement.quantity,
            available,
        });
    }
    trace!(
        "📦️ {} {} x{} ({:?})",
        inserted.direction,
        inserted.product_id,
        inserted.quantity,
        inserted.reason
    );
    Ok(MovementResult::Applied(inserted))
}

pub async fn movements_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockMovement>, StockLedgerError> {
    let movements = sqlx::query_as::<_, StockMovement>("SELECT * FROM stock_movements WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(movements)
}

/// Products whose counter does not equal the sum of their ledger movements.
pub async fn audit_stock(conn: &mut SqliteConnection) -> Result<Vec<StockDrift>, StockLedgerError> {
    let drift = sqlx::query_as::<_, StockDrift>(
        r#"
            SELECT
                p.product_id AS product_id,
                p.stock AS counter,
                COALESCE(SUM(CASE m.direction WHEN 'Increment' THEN m.quantity ELSE -m.quantity END), 0)
                    AS ledger_balance
            FROM products p
            LEFT JOIN stock_movements m ON m.product_id = p.product_id
            GROUP BY p.product_id, p.stock
            HAVING counter <> ledger_balance
            ORDER BY p.product_id;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(drift)
}
