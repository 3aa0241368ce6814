use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Caught on the terminal. Nothing was sent to the ledger.
    #[error("{0}")]
    LocalValidation(String),
    /// The ledger refused the check for a business reason. The tag has to be scanned again.
    #[error("Transaction refused. {0}")]
    ServerCheckRejected(LedgerError),
    #[error("{0}")]
    Ledger(LedgerError),
    #[error("Card payment failed. {0}")]
    CardSessionFailed(String),
    #[error("Card payment error. {0}")]
    CardSessionError(String),
    /// `queued`: the booking will be retried in the background. `reconciliation`: the payment was taken but the
    /// booking was rejected for good, and the request is kept for manual reconciliation.
    #[error("Booking failed. {error}{}", follow_up_note(.queued, .reconciliation))]
    BookingFailed { error: LedgerError, queued: bool, reconciliation: bool },
    #[error("{0}")]
    InvalidState(String),
    #[error("Could not read the tag. {0}")]
    TagScan(String),
    #[error("The booking task stopped unexpectedly. {0}")]
    CommitAborted(String),
}

impl WorkflowError {
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }
}

fn follow_up_note(queued: &bool, reconciliation: &bool) -> &'static str {
    match (*queued, *reconciliation) {
        (true, _) => " It will be retried automatically.",
        (false, true) => " The payment was recorded for manual reconciliation.",
        (false, false) => "",
    }
}
