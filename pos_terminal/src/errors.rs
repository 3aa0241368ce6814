use pos_engine::{ledger::LedgerError, PendingStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Invalid terminal configuration. {0}")]
    ConfigurationError(String),
    #[error("Could not initialize the HTTP client. {0}")]
    HttpClientError(String),
    #[error("Pending request store error. {0}")]
    StoreError(#[from] PendingStoreError),
    #[error("Ledger error. {0}")]
    LedgerError(#[from] LedgerError),
    #[error("{0} is not a valid idempotency key")]
    InvalidKey(String),
}
