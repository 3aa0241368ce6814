use std::time::Duration;

use crate::pos_types::{CompletedTransaction, ReconciliationRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Passes over the pending set per drain cycle. Entries left after the last pass wait for the next trigger.
    pub sweeps_per_drain: u32,
    /// Pause between two passes of the same drain cycle.
    pub sweep_delay: Duration,
    /// Periodic wake-up of the background worker. `None` means the worker only drains on start-up and on new
    /// enqueues.
    pub poll_interval: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { sweeps_per_drain: 3, sweep_delay: Duration::from_secs(1), poll_interval: Some(Duration::from_secs(60)) }
    }
}

/// What one drain cycle achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub confirmed: Vec<CompletedTransaction>,
    /// Requests that were rejected for good and moved to manual reconciliation.
    pub failed: Vec<ReconciliationRequest>,
    /// Requests still pending when the cycle ended.
    pub remaining: usize,
    pub sweeps: u32,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.failed.is_empty()
    }
}
