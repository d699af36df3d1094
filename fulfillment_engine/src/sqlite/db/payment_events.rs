use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPaymentEvent, OrderId, PaymentEvent},
    traits::{InsertEventResult, ReconciliationStoreError},
};

/// Inserts the idempotency record for a processed notification. A second insert for the same
/// `(transaction_id, provider_status)` is reported as `AlreadyExists` and writes nothing.
pub async fn insert_payment_event(
    event: NewPaymentEvent,
    conn: &mut SqliteConnection,
) -> Result<InsertEventResult, ReconciliationStoreError> {
    let result = sqlx::query_as::<_, PaymentEvent>(
        r#"
            INSERT INTO payment_events (transaction_id, provider_status, order_id, resulting_state, payload_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&event.transaction_id)
    .bind(&event.provider_status)
    .bind(&event.order_id)
    .bind(event.resulting_state)
    .bind(&event.payload_hash)
    .fetch_one(conn)
    .await;
    match result {
        Ok(e) => {
            trace!("🗃️ Payment event [{}:{}] recorded", e.transaction_id, e.provider_status);
            Ok(InsertEventResult::Inserted(e))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Payment event [{}:{}] already exists", event.transaction_id, event.provider_status);
            Ok(InsertEventResult::AlreadyExists)
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn event_exists(
    transaction_id: &str,
    provider_status: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, ReconciliationStoreError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payment_events WHERE transaction_id = $1 AND provider_status = $2")
            .bind(transaction_id)
            .bind(provider_status)
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}

pub async fn events_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEvent>, ReconciliationStoreError> {
    let events = sqlx::query_as::<_, PaymentEvent>("SELECT * FROM payment_events WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
