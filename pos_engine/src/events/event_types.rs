use chrono::{DateTime, Utc};

use crate::pos_types::{CompletedTransaction, ReconciliationRequest};

/// A queued booking was finally accepted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmedEvent {
    pub transaction: CompletedTransaction,
    /// Number of failed attempts before this one succeeded.
    pub failed_attempts: i64,
    pub confirmed_at: DateTime<Utc>,
}

impl BookingConfirmedEvent {
    pub fn new(transaction: CompletedTransaction, failed_attempts: i64) -> Self {
        Self { transaction, failed_attempts, confirmed_at: Utc::now() }
    }
}

/// A queued booking was permanently rejected and removed from the queue. Someone has to sort it out by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRequiredEvent {
    pub request: ReconciliationRequest,
}

impl ReconciliationRequiredEvent {
    pub fn new(request: ReconciliationRequest) -> Self {
        Self { request }
    }
}
