//! `SqliteDatabase` is the SQLite implementation of the pending request store.
use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use sqlx::SqlitePool;

use super::{db_url, new_pool, pending_requests, pending_requests::PendingRow, reconciliation};
use crate::{
    db::{PendingStore, PendingStoreError},
    pos_types::{IdempotencyKey, PendingRequest, ReconciliationRequest},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `POS_DATABASE_URL` (or the default path).
    pub async fn new(max_connections: u32) -> Result<Self, PendingStoreError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    /// Connects to the database at `url`, creating it if necessary, and brings the schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PendingStoreError> {
        let pool = new_pool(url, max_connections).await?;
        sqlx::migrate!("./src/db/sqlite/migrations").run(&pool).await?;
        debug!("🗃️ Pending request store at {url} is ready");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), PendingStoreError> {
        self.pool.close().await;
        Ok(())
    }

    /// Moves a pending row that can no longer be decoded out of the queue, so it cannot hold up the rows behind it.
    async fn quarantine(&self, row: PendingRow, cause: &PendingStoreError) -> Result<(), PendingStoreError> {
        let mut tx = self.pool.begin().await?;
        reconciliation::insert_from_pending(&row, &format!("Unreadable request. {cause}"), &mut tx).await?;
        pending_requests::delete_raw(&row.idempotency_key, &mut tx).await?;
        tx.commit().await?;
        error!("🗃️ Unreadable pending request {} moved to reconciliation. {cause}", row.idempotency_key);
        Ok(())
    }
}

#[async_trait]
impl PendingStore for SqliteDatabase {
    async fn upsert_pending(&self, request: &PendingRequest) -> Result<(), PendingStoreError> {
        let mut conn = self.pool.acquire().await?;
        pending_requests::upsert(request, &mut conn).await?;
        trace!("🗃️ {} {} saved as pending", request.kind, request.idempotency_key);
        Ok(())
    }

    async fn fetch_pending(&self) -> Result<Vec<PendingRequest>, PendingStoreError> {
        let rows = {
            let mut conn = self.pool.acquire().await?;
            pending_requests::fetch_all(&mut conn).await?
        };
        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            match PendingRequest::try_from(row.clone()) {
                Ok(request) => requests.push(request),
                Err(e) => self.quarantine(row, &e).await?,
            }
        }
        Ok(requests)
    }

    async fn fetch_pending_request(&self, key: &IdempotencyKey) -> Result<Option<PendingRequest>, PendingStoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = pending_requests::fetch_by_key(key, &mut conn).await?;
        row.map(PendingRequest::try_from).transpose()
    }

    async fn remove_pending(&self, key: &IdempotencyKey) -> Result<bool, PendingStoreError> {
        let mut conn = self.pool.acquire().await?;
        let removed = pending_requests::delete(key, &mut conn).await?;
        trace!("🗃️ Pending request {key} removed: {removed}");
        Ok(removed)
    }

    async fn record_attempt(&self, key: &IdempotencyKey, error: &str) -> Result<(), PendingStoreError> {
        let mut conn = self.pool.acquire().await?;
        pending_requests::increment_attempts(key, error, &mut conn).await
    }

    async fn move_to_reconciliation(
        &self,
        key: &IdempotencyKey,
        reason: &str,
    ) -> Result<Option<ReconciliationRequest>, PendingStoreError> {
        let mut tx = self.pool.begin().await?;
        let row = match pending_requests::fetch_by_key(key, &mut tx).await? {
            Some(row) => row,
            None => {
                debug!("🗃️ {key} is not pending, so there is nothing to reconcile");
                return Ok(None);
            },
        };
        let saved = reconciliation::insert_from_pending(&row, reason, &mut tx).await?;
        pending_requests::delete(key, &mut tx).await?;
        tx.commit().await?;
        warn!("🗃️ {} {key} moved to manual reconciliation. {reason}", row.kind);
        ReconciliationRequest::try_from(saved).map(Some)
    }

    async fn fetch_reconciliation(&self) -> Result<Vec<ReconciliationRequest>, PendingStoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = reconciliation::fetch_all(&mut conn).await?;
        let requests = rows
            .into_iter()
            .filter_map(|row| {
                let key = row.idempotency_key.clone();
                ReconciliationRequest::try_from(row)
                    .map_err(|e| error!("🗃️ Reconciliation entry {key} cannot be decoded. {e}"))
                    .ok()
            })
            .collect();
        Ok(requests)
    }

    async fn acknowledge_reconciliation(&self, key: &IdempotencyKey) -> Result<bool, PendingStoreError> {
        let mut conn = self.pool.acquire().await?;
        let removed = reconciliation::delete(key, &mut conn).await?;
        if removed {
            info!("🗃️ Reconciliation entry {key} acknowledged");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        pos_types::{LineItem, MinorUnits, PaymentMethod, TagIdentity, TransactionIntent, TransactionKind},
        test_utils::prepare_env::{prepare_test_env, random_db_url, tear_down},
    };

    async fn setup() -> SqliteDatabase {
        let url = random_db_url();
        prepare_test_env(&url).await
    }

    fn new_request(kind: TransactionKind, cents: i64) -> PendingRequest {
        let tag = TagIdentity::new("04AA");
        let intent = TransactionIntent::new(kind, MinorUnits::from(cents), tag, PaymentMethod::Cash);
        PendingRequest::new(intent)
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let db = setup().await;
        let request = new_request(TransactionKind::TopUp, 1000);
        db.upsert_pending(&request).await.unwrap();
        db.record_attempt(&request.idempotency_key, "timeout").await.unwrap();
        db.upsert_pending(&request).await.unwrap();
        let pending = db.fetch_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].intent, request.intent);
        assert_eq!(pending[0].attempts_done, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("timeout"));
        tear_down(db).await;
    }

    #[tokio::test]
    async fn pending_requests_are_listed_oldest_first() {
        let db = setup().await;
        let first = new_request(TransactionKind::TopUp, 100);
        let second = new_request(TransactionKind::Sale, 200);
        let second = PendingRequest {
            intent: second.intent.clone().with_line_items(vec![LineItem::new(3, 2, MinorUnits::from(100))]),
            ..second
        };
        db.upsert_pending(&first).await.unwrap();
        db.upsert_pending(&second).await.unwrap();
        let keys = db.fetch_pending().await.unwrap().into_iter().map(|r| r.idempotency_key).collect::<Vec<_>>();
        assert_eq!(keys, vec![first.idempotency_key, second.idempotency_key]);
        let stored = db.fetch_pending_request(&second.idempotency_key).await.unwrap().unwrap();
        assert_eq!(stored.intent.line_items.len(), 1);
        assert!(db.remove_pending(&first.idempotency_key).await.unwrap());
        assert!(!db.remove_pending(&first.idempotency_key).await.unwrap());
        assert_eq!(db.fetch_pending().await.unwrap().len(), 1);
        tear_down(db).await;
    }

    #[tokio::test]
    async fn unreadable_rows_are_moved_aside() {
        let db = setup().await;
        let sql = "INSERT INTO pending_requests (idempotency_key, kind, payload, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?)";
        sqlx::query(sql)
            .bind("not-a-uuid")
            .bind("TopUp")
            .bind("{}")
            .bind(chrono::Utc::now())
            .bind(chrono::Utc::now())
            .execute(db.pool())
            .await
            .unwrap();
        let request = new_request(TransactionKind::TopUp, 1000);
        db.upsert_pending(&request).await.unwrap();
        let pending = db.fetch_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].idempotency_key, request.idempotency_key);
        let sql = "SELECT idempotency_key, reason FROM reconciliation_requests";
        let (stored, reason): (String, String) = sqlx::query_as(sql)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(stored, "not-a-uuid");
        assert!(reason.starts_with("Unreadable request."));
        // Still listed in the table, but skipped when decoding the reconciliation list.
        assert!(db.fetch_reconciliation().await.unwrap().is_empty());
        tear_down(db).await;
    }

    #[tokio::test]
    async fn permanent_failures_move_to_reconciliation() {
        let db = setup().await;
        let request = new_request(TransactionKind::TicketSale, 2500);
        let key = request.idempotency_key;
        db.upsert_pending(&request).await.unwrap();
        db.record_attempt(&key, "503").await.unwrap();
        let moved = db.move_to_reconciliation(&key, "insufficient funds").await.unwrap().expect("nothing moved");
        assert_eq!(moved.idempotency_key, key);
        assert_eq!(moved.attempts_done, 2);
        assert_eq!(moved.reason, "insufficient funds");
        assert!(db.fetch_pending().await.unwrap().is_empty());
        assert!(db.move_to_reconciliation(&key, "again").await.unwrap().is_none());
        let listed = db.fetch_reconciliation().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].intent, request.intent);
        assert!(db.acknowledge_reconciliation(&key).await.unwrap());
        assert!(db.fetch_reconciliation().await.unwrap().is_empty());
        tear_down(db).await;
    }
}
