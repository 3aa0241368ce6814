//! Static per-kind policy registry.
//!
//! Every behaviour that differs between transaction kinds is written down here, explicitly, in one table:
//! which payment methods a kind accepts, whether a failed booking is handed to the durable request queue, and how
//! booking errors are classified for retry.
//!
//! Booking error classification:
//!
//! | error                                   | disposition |
//! |-----------------------------------------|-------------|
//! | `Transport`, `Timeout`, `Server`        | `Retry`     |
//! | `InvalidResponse` (unreadable answer)   | `Retry`     |
//! | `AccessDenied`                          | policy flag (`Permanent` for every kind today) |
//! | `NotFound`                              | policy flag (`Permanent` for every kind today) |
//! | `BadRequest`, `Rejected`                | `Permanent` |
use crate::{
    ledger::LedgerError,
    pos_types::{PaymentMethod, TransactionKind},
};

/// What to do with a booking that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingDisposition {
    /// The failure may be transient. Keep the request and try again later.
    Retry,
    /// The ledger will never accept this request. Stop and surface it.
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPolicy {
    pub kind: TransactionKind,
    pub payment_methods: &'static [PaymentMethod],
    /// Failed bookings of this kind are persisted and retried in the background.
    pub durable_retry: bool,
    pub retry_access_denied: bool,
    pub retry_not_found: bool,
}

// Top-ups: the customer has handed over cash or been charged on their card before the booking is made.
static TOPUP_POLICY: KindPolicy = KindPolicy {
    kind: TransactionKind::TopUp,
    payment_methods: &[PaymentMethod::Cash, PaymentMethod::Card],
    durable_retry: true,
    retry_access_denied: false,
    retry_not_found: false,
};

// Sales: the goods leave the counter once the operator confirms.
static SALE_POLICY: KindPolicy = KindPolicy {
    kind: TransactionKind::Sale,
    payment_methods: &[PaymentMethod::Tag],
    durable_retry: true,
    retry_access_denied: false,
    retry_not_found: false,
};

// Payouts: cash is only handed out after the ledger has confirmed the booking. A failed payout booking means no money
// left the till, so replaying it later would debit the tag for cash the customer never received.
static PAYOUT_POLICY: KindPolicy = KindPolicy {
    kind: TransactionKind::PayOut,
    payment_methods: &[PaymentMethod::Cash],
    durable_retry: false,
    retry_access_denied: false,
    retry_not_found: false,
};

static TICKET_SALE_POLICY: KindPolicy = KindPolicy {
    kind: TransactionKind::TicketSale,
    payment_methods: &[PaymentMethod::Cash, PaymentMethod::Card],
    durable_retry: true,
    retry_access_denied: false,
    retry_not_found: false,
};

impl KindPolicy {
    pub fn for_kind(kind: TransactionKind) -> &'static KindPolicy {
        match kind {
            TransactionKind::TopUp => &TOPUP_POLICY,
            TransactionKind::Sale => &SALE_POLICY,
            TransactionKind::PayOut => &PAYOUT_POLICY,
            TransactionKind::TicketSale => &TICKET_SALE_POLICY,
        }
    }

    pub fn accepts(&self, method: PaymentMethod) -> bool {
        self.payment_methods.contains(&method)
    }

    /// Classifies a failed `book` call for this kind.
    pub fn classify(&self, error: &LedgerError) -> BookingDisposition {
        use BookingDisposition::*;
        match error {
            LedgerError::Transport(_) | LedgerError::Timeout(_) | LedgerError::Server { .. } => Retry,
            // A success status with an unreadable body. The booking may or may not have been committed, and replaying it
            // with the same key settles the question.
            LedgerError::InvalidResponse(_) => Retry,
            LedgerError::AccessDenied(_) if self.retry_access_denied => Retry,
            LedgerError::NotFound(_) if self.retry_not_found => Retry,
            LedgerError::AccessDenied(_) | LedgerError::NotFound(_) => Permanent,
            LedgerError::BadRequest(_) | LedgerError::Rejected { .. } => Permanent,
        }
    }
}
