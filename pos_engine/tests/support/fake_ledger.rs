use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use pos_engine::{
    ledger::{LedgerApi, LedgerError, RejectionReason},
    pos_types::{
        CompletedTransaction,
        IdempotencyKey,
        MinorUnits,
        PendingTransaction,
        TagIdentity,
        TransactionIntent,
        TransactionKind,
    },
};

pub enum Scripted {
    /// The request never reaches the ledger.
    Fail(LedgerError),
    /// The ledger commits, but the answer is lost on the way back.
    CommitThenFail(LedgerError),
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<TagIdentity, MinorUnits>,
    committed: HashMap<IdempotencyKey, CompletedTransaction>,
    book_script: VecDeque<Scripted>,
    check_script: VecDeque<LedgerError>,
    check_calls: usize,
    book_calls: usize,
}

/// In-memory ledger that deduplicates bookings by idempotency key, like the real one.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn with_balance(tag: &str, balance: i64) -> Self {
        let ledger = Self::default();
        ledger.set_balance(tag, balance);
        ledger
    }

    pub fn set_balance(&self, tag: &str, balance: i64) {
        self.state.lock().unwrap().balances.insert(TagIdentity::new(tag), MinorUnits::from(balance));
    }

    pub fn balance(&self, tag: &str) -> MinorUnits {
        self.state.lock().unwrap().balances.get(&TagIdentity::new(tag)).copied().unwrap_or_default()
    }

    pub fn script_booking(&self, outcome: Scripted) {
        self.state.lock().unwrap().book_script.push_back(outcome);
    }

    pub fn script_check_failure(&self, error: LedgerError) {
        self.state.lock().unwrap().check_script.push_back(error);
    }

    pub fn book_calls(&self) -> usize {
        self.state.lock().unwrap().book_calls
    }

    pub fn check_calls(&self) -> usize {
        self.state.lock().unwrap().check_calls
    }

    /// Number of distinct bookings that changed the ledger.
    pub fn committed(&self) -> usize {
        self.state.lock().unwrap().committed.len()
    }

    fn check(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.check_calls += 1;
        if let Some(e) = state.check_script.pop_front() {
            return Err(e);
        }
        let balance = *state
            .balances
            .get(&intent.tag)
            .ok_or_else(|| LedgerError::rejected(RejectionReason::UnknownTag, intent.tag.to_string()))?;
        if debits(intent.kind) && balance < intent.amount {
            return Err(LedgerError::rejected(RejectionReason::InsufficientFunds, format!("balance is {balance}")));
        }
        Ok(PendingTransaction {
            idempotency_key: intent.idempotency_key,
            kind: intent.kind,
            server_reference: Some(format!("chk-{}", state.check_calls)),
            amount: intent.amount,
            current_balance: Some(balance),
        })
    }

    fn book(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.book_calls += 1;
        let lost_answer = match state.book_script.pop_front() {
            Some(Scripted::Fail(e)) => return Err(e),
            Some(Scripted::CommitThenFail(e)) => Some(e),
            None => None,
        };
        let completed = match state.committed.get(&intent.idempotency_key) {
            Some(done) => done.clone(),
            None => {
                let completed = apply(&mut state, intent)?;
                state.committed.insert(intent.idempotency_key, completed.clone());
                completed
            },
        };
        match lost_answer {
            Some(e) => Err(e),
            None => Ok(completed),
        }
    }
}

fn debits(kind: TransactionKind) -> bool {
    matches!(kind, TransactionKind::Sale | TransactionKind::PayOut)
}

fn apply(state: &mut LedgerState, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
    let old_balance = *state
        .balances
        .get(&intent.tag)
        .ok_or_else(|| LedgerError::rejected(RejectionReason::UnknownTag, intent.tag.to_string()))?;
    let new_balance = match intent.kind {
        TransactionKind::TopUp => old_balance + intent.amount,
        TransactionKind::TicketSale => old_balance,
        TransactionKind::Sale | TransactionKind::PayOut => {
            if old_balance < intent.amount {
                let message = format!("balance is {old_balance}");
                return Err(LedgerError::rejected(RejectionReason::InsufficientFunds, message));
            }
            old_balance - intent.amount
        },
    };
    state.balances.insert(intent.tag.clone(), new_balance);
    Ok(CompletedTransaction {
        idempotency_key: intent.idempotency_key,
        kind: intent.kind,
        server_reference: Some(format!("txn-{}", state.committed.len() + 1)),
        amount: intent.amount,
        old_balance,
        new_balance,
    })
}

#[async_trait]
impl LedgerApi for FakeLedger {
    async fn check_topup(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.check(intent)
    }

    async fn book_topup(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.book(intent)
    }

    async fn check_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.check(intent)
    }

    async fn book_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.book(intent)
    }

    async fn check_payout(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.check(intent)
    }

    async fn book_payout(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.book(intent)
    }

    async fn check_ticket_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.check(intent)
    }

    async fn book_ticket_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.book(intent)
    }
}
