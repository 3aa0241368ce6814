use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    ledger::{LedgerApi, LedgerError},
    pos_types::{CompletedTransaction, PendingTransaction, TransactionIntent, TransactionKind},
};

/// `TransactionRepository` is the two-phase facade over the remote ledger.
///
/// * [`Self::check`] asks the ledger to validate an intent without committing anything. The answer is advisory: the
///   tag balance can change between a check and the booking.
/// * [`Self::book`] commits the intent. It is the only authoritative step, and the one whose failures feed the durable
///   request queue.
///
/// Both calls forward the intent's idempotency key unchanged, so a booking repeated after a timeout resolves to the
/// original commit.
pub struct TransactionRepository<L> {
    ledger: Arc<L>,
}

impl<L> Clone for TransactionRepository<L> {
    fn clone(&self) -> Self {
        Self { ledger: Arc::clone(&self.ledger) }
    }
}

impl<L> Debug for TransactionRepository<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionRepository")
    }
}

impl<L> TransactionRepository<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger: Arc::new(ledger) }
    }

    pub fn from_shared(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<L> TransactionRepository<L>
where L: LedgerApi
{
    pub async fn check(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        trace!("🏦️ Checking {intent}");
        let result = match intent.kind {
            TransactionKind::TopUp => self.ledger.check_topup(intent).await,
            TransactionKind::Sale => self.ledger.check_sale(intent).await,
            TransactionKind::PayOut => self.ledger.check_payout(intent).await,
            TransactionKind::TicketSale => self.ledger.check_ticket_sale(intent).await,
        };
        let pending = result?;
        if pending.idempotency_key != intent.idempotency_key || pending.kind != intent.kind {
            return Err(LedgerError::InvalidResponse(format!(
                "Check for {} was answered for {} {}",
                intent.idempotency_key, pending.kind, pending.idempotency_key
            )));
        }
        debug!("🏦️ {} {} passed the ledger check", intent.kind, intent.idempotency_key);
        Ok(pending)
    }

    pub async fn book(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        trace!("🏦️ Booking {intent}");
        let result = match intent.kind {
            TransactionKind::TopUp => self.ledger.book_topup(intent).await,
            TransactionKind::Sale => self.ledger.book_sale(intent).await,
            TransactionKind::PayOut => self.ledger.book_payout(intent).await,
            TransactionKind::TicketSale => self.ledger.book_ticket_sale(intent).await,
        };
        let completed = match result {
            Ok(c) => c,
            Err(e) => {
                warn!("🏦️ Booking {} {} failed. {e}", intent.kind, intent.idempotency_key);
                return Err(e);
            },
        };
        if completed.idempotency_key != intent.idempotency_key || completed.kind != intent.kind {
            return Err(LedgerError::InvalidResponse(format!(
                "Booking for {} was answered for {} {}",
                intent.idempotency_key, completed.kind, completed.idempotency_key
            )));
        }
        info!(
            "🏦️ {} {} booked. Balance {} -> {}",
            intent.kind, intent.idempotency_key, completed.old_balance, completed.new_balance
        );
        Ok(completed)
    }
}
