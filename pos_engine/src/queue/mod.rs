//! The durable request queue.
//!
//! Once a workflow has committed to a money movement, the booking must reach the ledger exactly once, whatever
//! happens to the screen, the network or the process. The queue gives that guarantee by writing each request to the
//! [`PendingStore`](crate::db::PendingStore) before any network attempt and retrying it from there until the ledger
//! either accepts it or rejects it for good.
mod config;
mod durable_queue;

pub use config::{DrainReport, QueueConfig};
pub use durable_queue::DurableRequestQueue;
