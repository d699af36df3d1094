use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Anomaly, NewAnomaly},
    traits::ReconciliationStoreError,
};

/// Adds an anomaly to the review queue, or bumps the occurrence count of an identical one.
pub async fn upsert_anomaly(anomaly: NewAnomaly, conn: &mut SqliteConnection) -> Result<Anomaly, ReconciliationStoreError> {
    let record = sqlx::query_as::<_, Anomaly>(
        r#"
            INSERT INTO anomalies (order_id, transaction_id, provider_status, kind, detail)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (transaction_id, provider_status, kind) DO UPDATE SET
                occurrences = occurrences + 1,
                detail = excluded.detail,
                order_id = COALESCE(excluded.order_id, anomalies.order_id),
                last_seen_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(&anomaly.order_id)
    .bind(&anomaly.transaction_id)
    .bind(&anomaly.provider_status)
    .bind(anomaly.kind)
    .bind(&anomaly.detail)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Anomaly #{} ({}) for [{}:{}] seen {} time(s)",
        record.id, record.kind, record.transaction_id, record.provider_status, record.occurrences
    );
    Ok(record)
}

pub async fn fetch_anomalies(conn: &mut SqliteConnection) -> Result<Vec<Anomaly>, ReconciliationStoreError> {
    let anomalies = sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies ORDER BY last_seen_at DESC, id DESC")
        .fetch_all(conn)
        .await?;
    Ok(anomalies)
}
