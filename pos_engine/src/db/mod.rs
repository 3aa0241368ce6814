//! Durable storage for bookings that the ledger has not yet confirmed.
//!
//! The [`PendingStore`] trait describes what the durable request queue needs from a backend. SQLite is the
//! supported backend ([`sqlite::SqliteDatabase`]).
mod errors;
mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use errors::PendingStoreError;
pub use traits::PendingStore;
