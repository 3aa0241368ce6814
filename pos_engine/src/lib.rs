//! Cashless POS engine
//!
//! This library holds the terminal-side core of the cashless event payment platform. It drives external card payments
//! to completion and makes sure every resulting money movement is booked with the remote ledger exactly once, even
//! when the network drops, the process dies or the operator leaves the screen.
//!
//! The library is divided into the following sections:
//! 1. Shared data types ([`mod@pos_types`]) and the per-kind policy registry ([`mod@policy`]).
//! 2. The card payment orchestrator ([`mod@card`]). It owns the external card SDK session and walks it through the
//!    prerequisite actions (e.g. `Login` before `Checkout`) to a terminal outcome.
//! 3. The transaction repository ([`mod@ledger`]), a two-phase `check` / `book` facade over the remote ledger API.
//! 4. The durable request queue ([`mod@queue`]). Bookings that could not be confirmed are persisted (SQLite backend in
//!    [`mod@db`]) and retried by a background worker until the ledger accepts or definitively rejects them.
//! 5. Payment workflows ([`mod@workflow`]), one per transaction kind, sequencing amount entry, validation, card or
//!    cash payment and booking.
//!
//! The engine also provides a set of events that can be subscribed to ([`mod@events`]), for example when a queued
//! booking is finally confirmed, or when one needs manual reconciliation.
pub mod card;
pub mod db;
pub mod events;
pub mod ledger;
pub mod policy;
pub mod pos_types;
pub mod queue;
pub mod workflow;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use card::{CardOutcome, CardPaymentOrchestrator, CardSessionStatus};
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::{PendingStore, PendingStoreError};
pub use ledger::{LedgerApi, LedgerError, TransactionRepository};
pub use queue::{DrainReport, DurableRequestQueue, QueueConfig};
pub use workflow::{PaymentWorkflow, WorkflowError, WorkflowServices, WorkflowState};
