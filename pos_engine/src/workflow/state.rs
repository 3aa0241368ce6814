use std::fmt::Display;

use crate::{
    pos_types::{CompletedTransaction, PaymentMethod, PendingTransaction},
    workflow::WorkflowError,
};

/// `AmountEntry → AwaitingPaymentMethod → AwaitingConfirmation → Committing → {Done | Failed}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    AmountEntry,
    /// The ledger check passed.
    AwaitingPaymentMethod { pending: PendingTransaction },
    /// Waiting for the operator to confirm, e.g. that the cash was received.
    AwaitingConfirmation { method: PaymentMethod, pending: PendingTransaction },
    /// The card session and/or booking is running. It cannot be abandoned.
    Committing { method: PaymentMethod },
    Done { completed: CompletedTransaction },
    Failed { error: WorkflowError },
}

impl WorkflowState {
    /// States the operator can walk away from without leaving money unaccounted for.
    pub fn is_pre_commit(&self) -> bool {
        matches!(self, Self::AmountEntry | Self::AwaitingPaymentMethod { .. } | Self::AwaitingConfirmation { .. })
    }
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmountEntry => write!(f, "AmountEntry"),
            Self::AwaitingPaymentMethod { .. } => write!(f, "AwaitingPaymentMethod"),
            Self::AwaitingConfirmation { method, .. } => write!(f, "AwaitingConfirmation({method})"),
            Self::Committing { method } => write!(f, "Committing({method})"),
            Self::Done { .. } => write!(f, "Done"),
            Self::Failed { .. } => write!(f, "Failed"),
        }
    }
}
