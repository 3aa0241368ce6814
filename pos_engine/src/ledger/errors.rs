use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Business reasons the ledger gives when it refuses a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    InsufficientFunds,
    UnknownTag,
    TagBlocked,
    LimitExceeded,
    Other(String),
}

impl RejectionReason {
    /// Maps the ledger's machine-readable error code onto a reason.
    pub fn from_code(code: &str) -> Self {
        match code {
            "insufficient_funds" => Self::InsufficientFunds,
            "unknown_tag" => Self::UnknownTag,
            "tag_blocked" => Self::TagBlocked,
            "limit_exceeded" => Self::LimitExceeded,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::InsufficientFunds => write!(f, "insufficient funds"),
            RejectionReason::UnknownTag => write!(f, "unknown tag"),
            RejectionReason::TagBlocked => write!(f, "tag is blocked"),
            RejectionReason::LimitExceeded => write!(f, "limit exceeded"),
            RejectionReason::Other(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Could not reach the ledger. {0}")]
    Transport(String),
    #[error("The ledger did not answer in time. {0}")]
    Timeout(String),
    #[error("The ledger reported an internal error ({status}). {message}")]
    Server { status: u16, message: String },
    #[error("The terminal is not authorised for this request. {0}")]
    AccessDenied(String),
    #[error("The ledger does not know this resource. {0}")]
    NotFound(String),
    #[error("The ledger refused a malformed request. {0}")]
    BadRequest(String),
    #[error("The ledger rejected the transaction: {reason}. {message}")]
    Rejected { reason: RejectionReason, message: String },
    #[error("The ledger sent an unexpected response. {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    pub fn rejected<S: Into<String>>(reason: RejectionReason, message: S) -> Self {
        Self::Rejected { reason, message: message.into() }
    }

    /// True for the business-rule rejections the ledger signals with a dedicated error code, as opposed to transport
    /// or protocol failures.
    pub fn is_service_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFetchError {
    #[error("Could not fetch the card payment configuration. {0}")]
    Unavailable(#[from] LedgerError),
    #[error("The card payment configuration is incomplete. {0}")]
    Incomplete(String),
}
