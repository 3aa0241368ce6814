use async_trait::async_trait;

use crate::{
    db::PendingStoreError,
    pos_types::{IdempotencyKey, PendingRequest, ReconciliationRequest},
};

/// Persistence for the durable request queue.
///
/// Implementations must make every write durable before returning, and must serialise concurrent writers so that no
/// update is lost when several workflows enqueue at the same time.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Inserts the request, or refreshes the stored intent if a request with the same key already exists. Attempt
    /// bookkeeping of an existing row is preserved.
    async fn upsert_pending(&self, request: &PendingRequest) -> Result<(), PendingStoreError>;

    /// All pending requests, oldest first. Rows that can no longer be decoded are moved to the reconciliation list
    /// instead of failing the whole listing.
    async fn fetch_pending(&self) -> Result<Vec<PendingRequest>, PendingStoreError>;

    async fn fetch_pending_request(&self, key: &IdempotencyKey) -> Result<Option<PendingRequest>, PendingStoreError>;

    /// Removes a pending request. Returns `false` if there was nothing to remove.
    async fn remove_pending(&self, key: &IdempotencyKey) -> Result<bool, PendingStoreError>;

    /// Counts a failed, retryable attempt against the request.
    async fn record_attempt(&self, key: &IdempotencyKey, error: &str) -> Result<(), PendingStoreError>;

    /// Atomically moves a pending request to the manual reconciliation list. Returns `None` if no such request was
    /// pending.
    async fn move_to_reconciliation(
        &self,
        key: &IdempotencyKey,
        reason: &str,
    ) -> Result<Option<ReconciliationRequest>, PendingStoreError>;

    async fn fetch_reconciliation(&self) -> Result<Vec<ReconciliationRequest>, PendingStoreError>;

    /// Marks a reconciliation entry as dealt with by deleting it. Returns `false` if there was no such entry.
    async fn acknowledge_reconciliation(&self, key: &IdempotencyKey) -> Result<bool, PendingStoreError>;
}
