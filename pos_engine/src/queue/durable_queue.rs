use std::{collections::HashSet, fmt::Debug, sync::Arc};

use log::*;
use tokio::{
    sync::{Mutex, Notify},
    task::JoinHandle,
};

use crate::{
    db::{PendingStore, PendingStoreError},
    events::{BookingConfirmedEvent, EventProducers, ReconciliationRequiredEvent},
    ledger::{LedgerApi, LedgerError, TransactionRepository},
    policy::{BookingDisposition, KindPolicy},
    pos_types::{IdempotencyKey, PendingRequest, ReconciliationRequest, TransactionIntent},
    queue::{DrainReport, QueueConfig},
};

struct QueueInner<S, L> {
    store: S,
    repository: TransactionRepository<L>,
    config: QueueConfig,
    producers: EventProducers,
    wake: Notify,
    // Only one drain cycle runs at a time.
    drain_lock: Mutex<()>,
    // Keys a workflow or a drain cycle is booking right now. The drain loop never books a claimed key.
    in_flight: Mutex<HashSet<IdempotencyKey>>,
}

enum EntryResult {
    Confirmed,
    Retry,
    Failed,
    Skipped,
}

/// Persisted queue of bookings the ledger has not confirmed yet.
///
/// The queue is a cheap, cloneable handle. Every persisted entry is booked through the [`TransactionRepository`]
/// with its original idempotency key, so replaying an entry that the ledger did in fact commit is harmless.
pub struct DurableRequestQueue<S, L> {
    inner: Arc<QueueInner<S, L>>,
}

impl<S, L> Clone for DurableRequestQueue<S, L> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, L> Debug for DurableRequestQueue<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DurableRequestQueue({:?})", self.inner.config)
    }
}

impl<S, L> DurableRequestQueue<S, L>
where
    S: PendingStore + 'static,
    L: LedgerApi + 'static,
{
    pub fn new(
        store: S,
        repository: TransactionRepository<L>,
        config: QueueConfig,
        producers: EventProducers,
    ) -> Self {
        let inner = QueueInner {
            store,
            repository,
            config,
            producers,
            wake: Notify::new(),
            drain_lock: Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Persists the intent for background booking and wakes the worker. The request is durable once this returns.
    /// Enqueuing the same intent again does not create a second entry.
    pub async fn enqueue(&self, intent: &TransactionIntent) -> Result<(), PendingStoreError> {
        self.inner.store.upsert_pending(&PendingRequest::new(intent.clone())).await?;
        info!("📮️ {} {} queued for booking", intent.kind, intent.idempotency_key);
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Write-ahead step for a booking the caller is about to make itself. The intent is persisted, and claimed so
    /// that the drain loop leaves it alone until the caller calls [`Self::settle`] or [`Self::release`].
    pub async fn stage(&self, intent: &TransactionIntent) -> Result<(), PendingStoreError> {
        let key = intent.idempotency_key;
        self.inner.in_flight.lock().await.insert(key);
        if let Err(e) = self.inner.store.upsert_pending(&PendingRequest::new(intent.clone())).await {
            self.inner.in_flight.lock().await.remove(&key);
            return Err(e);
        }
        trace!("📮️ {} {key} staged", intent.kind);
        Ok(())
    }

    /// The staged booking was resolved by the caller (confirmed, or rejected in a way it reports itself). The entry is
    /// dropped.
    pub async fn settle(&self, key: &IdempotencyKey) -> Result<(), PendingStoreError> {
        let result = self.inner.store.remove_pending(key).await;
        self.inner.in_flight.lock().await.remove(key);
        result.map(|_| ())
    }

    /// The caller's own booking attempt failed in a retryable way. The attempt is recorded and the entry is handed
    /// over to the background worker.
    pub async fn release(&self, key: &IdempotencyKey, error: &LedgerError) -> Result<(), PendingStoreError> {
        let result = self.inner.store.record_attempt(key, &error.to_string()).await;
        self.inner.in_flight.lock().await.remove(key);
        info!("📮️ {key} handed over to the background worker");
        self.inner.wake.notify_one();
        result
    }

    /// The caller's own booking attempt was rejected for good after money already changed hands. The entry goes to
    /// manual reconciliation instead of being dropped.
    pub async fn fail(
        &self,
        key: &IdempotencyKey,
        error: &LedgerError,
    ) -> Result<Option<ReconciliationRequest>, PendingStoreError> {
        let result = self.move_to_reconciliation(key, &error.to_string()).await;
        self.inner.in_flight.lock().await.remove(key);
        result
    }

    async fn move_to_reconciliation(
        &self,
        key: &IdempotencyKey,
        reason: &str,
    ) -> Result<Option<ReconciliationRequest>, PendingStoreError> {
        let moved = self.inner.store.move_to_reconciliation(key, reason).await?;
        if let Some(failed) = &moved {
            let event = ReconciliationRequiredEvent::new(failed.clone());
            self.inner.producers.publish_reconciliation_required(event).await;
        }
        Ok(moved)
    }

    pub async fn pending(&self) -> Result<Vec<PendingRequest>, PendingStoreError> {
        self.inner.store.fetch_pending().await
    }

    pub async fn reconciliation(&self) -> Result<Vec<ReconciliationRequest>, PendingStoreError> {
        self.inner.store.fetch_reconciliation().await
    }

    pub async fn acknowledge(&self, key: &IdempotencyKey) -> Result<bool, PendingStoreError> {
        self.inner.store.acknowledge_reconciliation(key).await
    }

    /// Runs one drain cycle: up to `sweeps_per_drain` passes over the pending set, pausing `sweep_delay` between
    /// passes. Entries still pending afterwards stay persisted for the next trigger.
    pub async fn drain(&self) -> Result<DrainReport, PendingStoreError> {
        let _guard = self.inner.drain_lock.lock().await;
        let mut report = DrainReport::default();
        let sweeps = self.inner.config.sweeps_per_drain.max(1);
        for sweep in 1..=sweeps {
            let entries = self.inner.store.fetch_pending().await?;
            if entries.is_empty() {
                break;
            }
            report.sweeps = sweep;
            debug!("📮️ Sweep {sweep}/{sweeps} over {} pending requests", entries.len());
            let mut retry_later = 0;
            for request in entries {
                match self.process(request, &mut report).await? {
                    EntryResult::Retry => retry_later += 1,
                    EntryResult::Confirmed | EntryResult::Failed | EntryResult::Skipped => {},
                }
            }
            if retry_later == 0 {
                break;
            }
            if sweep < sweeps {
                tokio::time::sleep(self.inner.config.sweep_delay).await;
            }
        }
        report.remaining = self.inner.store.fetch_pending().await?.len();
        if !report.is_empty() || report.remaining > 0 {
            info!(
                "📮️ Drain finished after {} sweeps. {} confirmed, {} sent to reconciliation, {} still pending",
                report.sweeps,
                report.confirmed.len(),
                report.failed.len(),
                report.remaining
            );
        }
        Ok(report)
    }

    async fn process(
        &self,
        request: PendingRequest,
        report: &mut DrainReport,
    ) -> Result<EntryResult, PendingStoreError> {
        let key = request.idempotency_key;
        if !self.inner.in_flight.lock().await.insert(key) {
            trace!("📮️ {key} is being booked elsewhere. Skipping");
            return Ok(EntryResult::Skipped);
        }
        let result = self.book_claimed(request, report).await;
        self.inner.in_flight.lock().await.remove(&key);
        result
    }

    async fn book_claimed(
        &self,
        request: PendingRequest,
        report: &mut DrainReport,
    ) -> Result<EntryResult, PendingStoreError> {
        let key = request.idempotency_key;
        // The entry may have been settled between the listing and the claim.
        if self.inner.store.fetch_pending_request(&key).await?.is_none() {
            return Ok(EntryResult::Skipped);
        }
        let policy = KindPolicy::for_kind(request.kind);
        match self.inner.repository.book(&request.intent).await {
            Ok(completed) => {
                self.inner.store.remove_pending(&key).await?;
                info!("📮️ Queued {} {key} confirmed after {} failed attempts", request.kind, request.attempts_done);
                let event = BookingConfirmedEvent::new(completed.clone(), request.attempts_done);
                self.inner.producers.publish_booking_confirmed(event).await;
                report.confirmed.push(completed);
                Ok(EntryResult::Confirmed)
            },
            Err(e) => match policy.classify(&e) {
                BookingDisposition::Retry => {
                    warn!("📮️ {} {key} will be retried. {e}", request.kind);
                    self.inner.store.record_attempt(&key, &e.to_string()).await?;
                    Ok(EntryResult::Retry)
                },
                BookingDisposition::Permanent => {
                    error!("📮️ {} {key} was rejected for good. {e}", request.kind);
                    if let Some(failed) = self.move_to_reconciliation(&key, &e.to_string()).await? {
                        report.failed.push(failed);
                    }
                    Ok(EntryResult::Failed)
                },
            },
        }
    }

    /// Starts the background drain worker. It drains once straight away, then again whenever something is enqueued or
    /// released, and on every `poll_interval` tick. Do not await the returned JoinHandle, as it runs indefinitely.
    pub fn start_worker(&self) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            info!("📮️ Durable request queue worker started");
            loop {
                if let Err(e) = queue.drain().await {
                    error!("📮️ Error draining the request queue: {e}");
                }
                match queue.inner.config.poll_interval {
                    Some(interval) => {
                        let _ = tokio::time::timeout(interval, queue.inner.wake.notified()).await;
                    },
                    None => queue.inner.wake.notified().await,
                }
            }
        })
    }
}
