//! Two-phase access to the remote transaction ledger.
//!
//! [`LedgerApi`] is the raw collaborator interface: one `check_*` / `book_*` pair per transaction kind. The concrete
//! HTTP implementation lives in the terminal crate. [`TransactionRepository`] sits on top of it and routes an intent
//! to the right pair based on its kind.
mod api;
mod errors;
mod repository;

pub use api::{CardConfigSource, LedgerApi};
pub use errors::{ConfigFetchError, LedgerError, RejectionReason};
pub use repository::TransactionRepository;
