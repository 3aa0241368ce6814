//! Wires the engine to its production collaborators: the SQLite pending store and the HTTP ledger client.
use std::sync::Arc;

use log::*;
use pos_engine::{
    card::{CardPaymentOrchestrator, CardSdk},
    events::EventProducers,
    pos_types::TransactionKind,
    DurableRequestQueue,
    PaymentWorkflow,
    SqliteDatabase,
    TransactionRepository,
    WorkflowServices,
};
use tokio::task::JoinHandle;

use crate::{config::TerminalConfig, errors::TerminalError, ledger_client::HttpLedgerClient};

const MAX_DB_CONNECTIONS: u32 = 5;

pub type TerminalQueue = DurableRequestQueue<SqliteDatabase, HttpLedgerClient>;
pub type TerminalWorkflow = PaymentWorkflow<HttpLedgerClient, SqliteDatabase>;

pub struct Terminal {
    config: TerminalConfig,
    db: SqliteDatabase,
    client: Arc<HttpLedgerClient>,
    repository: TransactionRepository<HttpLedgerClient>,
    queue: TerminalQueue,
}

impl Terminal {
    pub async fn connect(config: TerminalConfig, producers: EventProducers) -> Result<Self, TerminalError> {
        let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS).await?;
        let client = Arc::new(HttpLedgerClient::new(&config)?);
        let repository = TransactionRepository::from_shared(Arc::clone(&client));
        let queue = DurableRequestQueue::new(db.clone(), repository.clone(), config.queue.clone(), producers);
        info!("🚀️ Terminal {} connected to the ledger at {}", client.terminal_id(), client.base_url());
        Ok(Self { config, db, client, repository, queue })
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn queue(&self) -> &TerminalQueue {
        &self.queue
    }

    pub fn repository(&self) -> &TransactionRepository<HttpLedgerClient> {
        &self.repository
    }

    /// Starts the card payment orchestrator for this terminal. Card configuration is fetched from the ledger for every
    /// session.
    pub fn start_card_orchestrator<S: CardSdk>(&self, sdk: Arc<S>) -> (CardPaymentOrchestrator, JoinHandle<()>) {
        CardPaymentOrchestrator::start(sdk, Arc::clone(&self.client))
    }

    pub fn workflow_services(
        &self,
        card: Option<CardPaymentOrchestrator>,
    ) -> WorkflowServices<HttpLedgerClient, SqliteDatabase> {
        WorkflowServices { repository: self.repository.clone(), queue: self.queue.clone(), card }
    }

    pub fn new_workflow(&self, kind: TransactionKind, card: Option<CardPaymentOrchestrator>) -> TerminalWorkflow {
        PaymentWorkflow::new(kind, self.workflow_services(card), self.config.limits.clone())
    }

    pub async fn close(mut self) -> Result<(), TerminalError> {
        self.db.close().await?;
        debug!("🚀️ Terminal shut down");
        Ok(())
    }
}
