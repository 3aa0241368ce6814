use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::pending_requests::{decode_payload, PendingRow};
use crate::{
    db::PendingStoreError,
    pos_types::{IdempotencyKey, ReconciliationRequest},
};

#[derive(Debug, Clone, FromRow)]
pub struct ReconciliationRow {
    pub idempotency_key: String,
    pub kind: String,
    pub payload: String,
    pub attempts: i64,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl TryFrom<ReconciliationRow> for ReconciliationRequest {
    type Error = PendingStoreError;

    fn try_from(row: ReconciliationRow) -> Result<Self, Self::Error> {
        let (idempotency_key, kind, intent) = decode_payload(&row.idempotency_key, &row.kind, &row.payload)?;
        Ok(ReconciliationRequest {
            idempotency_key,
            kind,
            intent,
            attempts_done: row.attempts,
            reason: row.reason,
            failed_at: row.failed_at,
        })
    }
}

/// Copies a pending row into the reconciliation table. The final (failed) attempt is counted. Run this inside the same
/// transaction as the delete from `pending_requests`.
pub async fn insert_from_pending(
    row: &PendingRow,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationRow, PendingStoreError> {
    let saved = sqlx::query_as(
        r#"
            INSERT INTO reconciliation_requests (idempotency_key, kind, payload, attempts, reason, failed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (idempotency_key) DO UPDATE SET
                attempts = excluded.attempts, reason = excluded.reason, failed_at = excluded.failed_at
            RETURNING *;
        "#,
    )
    .bind(row.idempotency_key.as_str())
    .bind(row.kind.as_str())
    .bind(row.payload.as_str())
    .bind(row.attempts + 1)
    .bind(reason)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(saved)
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<ReconciliationRow>, PendingStoreError> {
    let rows = sqlx::query_as("SELECT * FROM reconciliation_requests ORDER BY failed_at ASC").fetch_all(conn).await?;
    Ok(rows)
}

pub async fn delete(key: &IdempotencyKey, conn: &mut SqliteConnection) -> Result<bool, PendingStoreError> {
    let result = sqlx::query("DELETE FROM reconciliation_requests WHERE idempotency_key = ?")
        .bind(key.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
