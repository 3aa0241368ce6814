use async_trait::async_trait;
use mockall::mock;

use crate::{
    ledger::{LedgerApi, LedgerError},
    pos_types::{CompletedTransaction, PendingTransaction, TransactionIntent},
};

mock! {
    pub Ledger {}
    #[async_trait]
    impl LedgerApi for Ledger {
        async fn check_topup(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
        async fn book_topup(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
        async fn check_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
        async fn book_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
        async fn check_payout(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
        async fn book_payout(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
        async fn check_ticket_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError>;
        async fn book_ticket_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError>;
    }
}
