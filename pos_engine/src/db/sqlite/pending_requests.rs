use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db::PendingStoreError,
    pos_types::{IdempotencyKey, PendingRequest, TransactionIntent, TransactionKind},
};

#[derive(Debug, Clone, FromRow)]
pub struct PendingRow {
    pub idempotency_key: String,
    pub kind: String,
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingRequest {
    type Error = PendingStoreError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        let (idempotency_key, kind, intent) = decode_payload(&row.idempotency_key, &row.kind, &row.payload)?;
        Ok(PendingRequest {
            idempotency_key,
            kind,
            intent,
            attempts_done: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Parses the stored key, kind and serialized intent, and checks that they agree with each other.
pub(crate) fn decode_payload(
    key: &str,
    kind: &str,
    payload: &str,
) -> Result<(IdempotencyKey, TransactionKind, TransactionIntent), PendingStoreError> {
    let corrupt = |msg: String| PendingStoreError::CorruptRecord(key.to_string(), msg);
    let idempotency_key = key.parse::<IdempotencyKey>().map_err(|e| corrupt(e.to_string()))?;
    let kind = kind.parse::<TransactionKind>().map_err(|e| corrupt(e.to_string()))?;
    let intent: TransactionIntent = serde_json::from_str(payload)?;
    if intent.idempotency_key != idempotency_key || intent.kind != kind {
        return Err(corrupt(format!("payload belongs to {} {}", intent.kind, intent.idempotency_key)));
    }
    Ok((idempotency_key, kind, intent))
}

/// Inserts the request. If the key is already present only the payload is refreshed, so that repeated enqueues of the
/// same intent never produce a second row or reset the attempt counter.
pub async fn upsert(request: &PendingRequest, conn: &mut SqliteConnection) -> Result<(), PendingStoreError> {
    let payload = serde_json::to_string(&request.intent)?;
    sqlx::query(
        r#"
            INSERT INTO pending_requests (idempotency_key, kind, payload, attempts, last_error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (idempotency_key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at;
        "#,
    )
    .bind(request.idempotency_key.to_string())
    .bind(request.kind.to_string())
    .bind(payload)
    .bind(request.attempts_done)
    .bind(request.last_error.clone())
    .bind(request.created_at)
    .bind(request.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<PendingRow>, PendingStoreError> {
    let rows = sqlx::query_as("SELECT * FROM pending_requests ORDER BY created_at ASC, rowid ASC")
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn fetch_by_key(
    key: &IdempotencyKey,
    conn: &mut SqliteConnection,
) -> Result<Option<PendingRow>, PendingStoreError> {
    let row = sqlx::query_as("SELECT * FROM pending_requests WHERE idempotency_key = ?")
        .bind(key.to_string())
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn delete(key: &IdempotencyKey, conn: &mut SqliteConnection) -> Result<bool, PendingStoreError> {
    delete_raw(&key.to_string(), conn).await
}

/// Deletes by the key exactly as stored, which need not be a valid idempotency key.
pub async fn delete_raw(key: &str, conn: &mut SqliteConnection) -> Result<bool, PendingStoreError> {
    let result = sqlx::query("DELETE FROM pending_requests WHERE idempotency_key = ?").bind(key).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn increment_attempts(
    key: &IdempotencyKey,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PendingStoreError> {
    sqlx::query(
        r#"
            UPDATE pending_requests SET attempts = attempts + 1, last_error = ?, updated_at = ?
            WHERE idempotency_key = ?
        "#,
    )
    .bind(error)
    .bind(Utc::now())
    .bind(key.to_string())
    .execute(conn)
    .await?;
    Ok(())
}
