use async_trait::async_trait;

use crate::{
    card::CardConfig,
    ledger::{ConfigFetchError, LedgerError},
    pos_types::{CompletedTransaction, PendingTransaction, TransactionIntent},
};

/// The remote ledger API, as seen from the terminal.
///
/// Every call carries the intent's client-generated idempotency key. `check_*` validates without committing; `book_*`
/// commits and is the single authoritative step. A repeated `book_*` with a key the ledger has already committed
/// resolves to the original commit.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn check_topup(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
    async fn book_topup(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
    async fn check_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
    async fn book_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
    async fn check_payout(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
    async fn book_payout(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
    async fn check_ticket_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
    async fn book_ticket_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
}

/// Source of the merchant / affiliate / terminal identity the card SDK needs. A fresh snapshot is fetched for every
/// card session.
#[async_trait]
pub trait CardConfigSource: Send + Sync {
    async fn fetch_card_config(&self) -> Result<CardConfig, ConfigFetchError>;
}
