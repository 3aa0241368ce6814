use log::*;
use tokio::task::JoinHandle;

use crate::{
    card::{CardOutcome, CardPayment, CardPaymentOrchestrator},
    db::PendingStore,
    ledger::{LedgerApi, TransactionRepository},
    policy::{BookingDisposition, KindPolicy},
    pos_types::{
        CompletedTransaction,
        LineItem,
        MinorUnits,
        PaymentMethod,
        PendingTransaction,
        TagIdentity,
        TransactionIntent,
        TransactionKind,
    },
    queue::DurableRequestQueue,
    workflow::{TagReader, WorkflowError, WorkflowState},
};

/// Amount limits checked on the terminal before anything is sent to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowLimits {
    pub topup_min: MinorUnits,
    pub topup_max: MinorUnits,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self { topup_min: MinorUnits::from(100), topup_max: MinorUnits::from(50_000) }
    }
}

impl WorkflowLimits {
    pub fn validate(&self, kind: TransactionKind, amount: MinorUnits) -> Result<(), WorkflowError> {
        if !amount.is_positive() {
            return Err(WorkflowError::LocalValidation(format!("The amount must be positive, not {amount}")));
        }
        if kind == TransactionKind::TopUp {
            if amount < self.topup_min {
                return Err(WorkflowError::LocalValidation(format!("The minimum top-up is {}", self.topup_min)));
            }
            if amount > self.topup_max {
                return Err(WorkflowError::LocalValidation(format!("The maximum top-up is {}", self.topup_max)));
            }
        }
        Ok(())
    }
}

/// Everything a workflow talks to.
pub struct WorkflowServices<L, S> {
    pub repository: TransactionRepository<L>,
    pub queue: DurableRequestQueue<S, L>,
    /// `None` on terminals without a card reader. Card payments are refused there.
    pub card: Option<CardPaymentOrchestrator>,
}

impl<L, S> Clone for WorkflowServices<L, S> {
    fn clone(&self) -> Self {
        Self { repository: self.repository.clone(), queue: self.queue.clone(), card: self.card.clone() }
    }
}

type CommitHandle = JoinHandle<Result<CompletedTransaction, WorkflowError>>;

/// Drives one transaction of a given kind from amount entry to a booked (or failed) transaction.
///
/// Amount entry, the ledger check and payment method selection can be abandoned at any time. Once the operator
/// confirms, the card session and the booking run in their own task. Dropping the future returned by
/// [`Self::confirm`] does not cancel them; calling `confirm` again picks up the result.
pub struct PaymentWorkflow<L, S> {
    kind: TransactionKind,
    policy: &'static KindPolicy,
    services: WorkflowServices<L, S>,
    limits: WorkflowLimits,
    tag: Option<TagIdentity>,
    intent: Option<TransactionIntent>,
    state: WorkflowState,
    status: String,
    commit: Option<CommitHandle>,
}

impl<L, S> PaymentWorkflow<L, S>
where
    L: LedgerApi + 'static,
    S: PendingStore + 'static,
{
    pub fn new(kind: TransactionKind, services: WorkflowServices<L, S>, limits: WorkflowLimits) -> Self {
        Self {
            kind,
            policy: KindPolicy::for_kind(kind),
            services,
            limits,
            tag: None,
            intent: None,
            state: WorkflowState::AmountEntry,
            status: "Scan a tag".to_string(),
            commit: None,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn tag(&self) -> Option<&TagIdentity> {
        self.tag.as_ref()
    }

    pub fn intent(&self) -> Option<&TransactionIntent> {
        self.intent.as_ref()
    }

    /// The message the operator should see right now. Every failure ends up here.
    pub fn status_message(&self) -> &str {
        &self.status
    }

    pub async fn scan_tag<R: TagReader + ?Sized>(&mut self, reader: &R) -> Result<TagIdentity, WorkflowError> {
        self.require_amount_entry()?;
        match reader.scan().await {
            Ok(tag) => {
                self.attach_tag(tag.clone());
                Ok(tag)
            },
            Err(e) => Err(self.fail_soft(WorkflowError::TagScan(e.to_string()))),
        }
    }

    pub fn set_tag(&mut self, tag: TagIdentity) -> Result<(), WorkflowError> {
        self.require_amount_entry()?;
        self.attach_tag(tag);
        Ok(())
    }

    /// Validates the amount locally, then asks the ledger to check the transaction.
    pub async fn enter_amount(&mut self, amount: MinorUnits) -> Result<PendingTransaction, WorkflowError> {
        self.require_amount_entry()?;
        let intent = self.new_intent(amount, Vec::new())?;
        self.check(intent).await
    }

    /// Like [`Self::enter_amount`], with the amount being the total of the given line items.
    pub async fn enter_items(&mut self, items: Vec<LineItem>) -> Result<PendingTransaction, WorkflowError> {
        self.require_amount_entry()?;
        if items.is_empty() {
            return Err(self.fail_soft(WorkflowError::LocalValidation("Add at least one item".into())));
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0 || !i.unit_price.is_positive()) {
            let msg = format!("Item {} needs a positive quantity and price", item.product_id);
            return Err(self.fail_soft(WorkflowError::LocalValidation(msg)));
        }
        let total = items.iter().try_fold(MinorUnits::default(), |sum, item| item.total()?.checked_add(sum));
        let Some(amount) = total else {
            return Err(self.fail_soft(WorkflowError::LocalValidation("The order total is too large".into())));
        };
        let intent = self.new_intent(amount, items)?;
        self.check(intent).await
    }

    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<(), WorkflowError> {
        let pending = match &self.state {
            WorkflowState::AwaitingPaymentMethod { pending } | WorkflowState::AwaitingConfirmation { pending, .. } => {
                pending.clone()
            },
            other => return Err(WorkflowError::invalid_state(format!("Cannot choose a payment method in {other}"))),
        };
        if !self.policy.accepts(method) {
            let msg = format!("{} cannot be paid by {method}", self.kind);
            return Err(self.fail_soft(WorkflowError::LocalValidation(msg)));
        }
        if method == PaymentMethod::Card && self.services.card.is_none() {
            let msg = "This terminal has no card reader".to_string();
            return Err(self.fail_soft(WorkflowError::LocalValidation(msg)));
        }
        let Some(intent) = self.intent.as_mut() else {
            return Err(WorkflowError::invalid_state("No transaction has been checked"));
        };
        intent.payment_method = method;
        let amount = intent.amount;
        self.status = match method {
            PaymentMethod::Cash if self.kind == TransactionKind::PayOut => format!("Confirm to pay out {amount}"),
            PaymentMethod::Cash => format!("Collect {amount} in cash, then confirm"),
            PaymentMethod::Card => format!("Confirm to charge {amount} to the card"),
            PaymentMethod::Tag => format!("Confirm to charge {amount} to the tag"),
        };
        debug!("🧾️ {} will be paid by {method}", self.kind);
        self.state = WorkflowState::AwaitingConfirmation { method, pending };
        Ok(())
    }

    /// Commits the transaction: runs the card session if paying by card, then books with the ledger.
    pub async fn confirm(&mut self) -> Result<CompletedTransaction, WorkflowError> {
        match &self.state {
            WorkflowState::AwaitingConfirmation { method, .. } => {
                let method = *method;
                let Some(intent) = self.intent.clone() else {
                    return Err(WorkflowError::invalid_state("No transaction has been checked"));
                };
                info!("🧾️ Committing {intent}");
                let services = self.services.clone();
                self.commit = Some(tokio::spawn(commit(services, self.policy, intent)));
                self.status = match method {
                    PaymentMethod::Card => "Card payment in progress".to_string(),
                    _ => "Booking".to_string(),
                };
                self.state = WorkflowState::Committing { method };
            },
            WorkflowState::Committing { .. } => debug!("🧾️ Resuming the running commit"),
            other => return Err(WorkflowError::invalid_state(format!("Nothing to confirm in {other}"))),
        }
        let result = match self.commit.as_mut() {
            Some(handle) => handle.await,
            None => return Err(WorkflowError::invalid_state("The commit task is missing")),
        };
        self.commit = None;
        let result = result.unwrap_or_else(|e| Err(WorkflowError::CommitAborted(e.to_string())));
        match result {
            Ok(completed) => {
                self.status = format!("Done. Balance {} -> {}", completed.old_balance, completed.new_balance);
                info!("🧾️ {} {} done", self.kind, completed.idempotency_key);
                self.state = WorkflowState::Done { completed: completed.clone() };
                Ok(completed)
            },
            Err(error) => {
                self.status = error.to_string();
                warn!("🧾️ {} failed. {error}", self.kind);
                self.state = WorkflowState::Failed { error: error.clone() };
                Err(error)
            },
        }
    }

    /// Drops the current transaction. Only allowed before the operator confirmed.
    pub fn abandon(&mut self) -> Result<(), WorkflowError> {
        if !self.state.is_pre_commit() {
            return Err(WorkflowError::invalid_state(format!("A transaction in {} cannot be abandoned", self.state)));
        }
        if let Some(intent) = self.intent.take() {
            debug!("🧾️ {} {} abandoned", intent.kind, intent.idempotency_key);
        }
        self.state = WorkflowState::AmountEntry;
        self.status = "Transaction cancelled".to_string();
        Ok(())
    }

    /// Starts over with a new transaction (and a new idempotency key). The tag has to be scanned again.
    pub fn reset(&mut self) -> Result<(), WorkflowError> {
        if matches!(self.state, WorkflowState::Committing { .. }) {
            return Err(WorkflowError::invalid_state("A transaction is still being committed"));
        }
        self.intent = None;
        self.tag = None;
        self.state = WorkflowState::AmountEntry;
        self.status = "Scan a tag".to_string();
        Ok(())
    }

    fn require_amount_entry(&self) -> Result<(), WorkflowError> {
        match self.state {
            WorkflowState::AmountEntry => Ok(()),
            ref other => {
                Err(WorkflowError::invalid_state(format!("Expected amount entry, but the workflow is {other}")))
            },
        }
    }

    fn attach_tag(&mut self, tag: TagIdentity) {
        debug!("🧾️ Tag {tag} attached to {}", self.kind);
        self.status = format!("Tag {tag}. Enter the amount");
        self.tag = Some(tag);
    }

    /// Reports an error that leaves the state as it is.
    fn fail_soft(&mut self, error: WorkflowError) -> WorkflowError {
        debug!("🧾️ {}: {error}", self.kind);
        self.status = error.to_string();
        error
    }

    fn new_intent(&mut self, amount: MinorUnits, items: Vec<LineItem>) -> Result<TransactionIntent, WorkflowError> {
        if let Err(e) = self.limits.validate(self.kind, amount) {
            return Err(self.fail_soft(e));
        }
        let Some(tag) = self.tag.clone() else {
            return Err(self.fail_soft(WorkflowError::LocalValidation("Scan a tag first".into())));
        };
        let method = self.policy.payment_methods.first().copied().unwrap_or(PaymentMethod::Cash);
        Ok(TransactionIntent::new(self.kind, amount, tag, method).with_line_items(items))
    }

    async fn check(&mut self, intent: TransactionIntent) -> Result<PendingTransaction, WorkflowError> {
        match self.services.repository.check(&intent).await {
            Ok(pending) => {
                self.status = match pending.current_balance {
                    Some(balance) => format!("Balance {balance}. Choose a payment method"),
                    None => "Choose a payment method".to_string(),
                };
                self.intent = Some(intent);
                self.state = WorkflowState::AwaitingPaymentMethod { pending: pending.clone() };
                Ok(pending)
            },
            Err(e) if e.is_service_rejection() => {
                info!("🧾️ {} refused by the ledger. Clearing tag. {e}", self.kind);
                self.tag = None;
                let error = self.fail_soft(WorkflowError::ServerCheckRejected(e));
                self.status = format!("{}. Scan the tag again", self.status);
                Err(error)
            },
            Err(e) => Err(self.fail_soft(WorkflowError::Ledger(e))),
        }
    }
}

/// The irreversible part of a workflow. Runs in its own task.
async fn commit<L, S>(
    services: WorkflowServices<L, S>,
    policy: &'static KindPolicy,
    intent: TransactionIntent,
) -> Result<CompletedTransaction, WorkflowError>
where
    L: LedgerApi + 'static,
    S: PendingStore + 'static,
{
    let key = intent.idempotency_key;
    if intent.payment_method == PaymentMethod::Card {
        let Some(card) = services.card.as_ref() else {
            return Err(WorkflowError::CardSessionError("This terminal has no card reader".into()));
        };
        let payment = CardPayment::new(key.to_string(), intent.amount, format!("{} {}", intent.kind, intent.amount));
        match card.pay(payment).await {
            CardOutcome::Success(receipt) => debug!("🧾️ Card charged for {key} in session {}", receipt.session_id),
            CardOutcome::Failed(msg) => return Err(WorkflowError::CardSessionFailed(msg)),
            CardOutcome::Error(msg) => return Err(WorkflowError::CardSessionError(msg)),
        }
    }
    let mut durable = policy.durable_retry;
    if durable {
        if let Err(e) = services.queue.stage(&intent).await {
            error!("🧾️ Could not persist {key} before booking. Booking without a safety net. {e}");
            durable = false;
        }
    }
    match services.repository.book(&intent).await {
        Ok(completed) => {
            if durable {
                if let Err(e) = services.queue.settle(&key).await {
                    warn!("🧾️ {key} is booked but still listed as pending. It will be replayed harmlessly. {e}");
                }
            }
            Ok(completed)
        },
        Err(error) => {
            let queued = durable && policy.classify(&error) == BookingDisposition::Retry;
            let mut reconciliation = false;
            if queued {
                if let Err(e) = services.queue.release(&key, &error).await {
                    warn!("🧾️ Could not record the failed attempt for {key}. {e}");
                }
            } else if durable && intent.payment_method.is_collected_by_terminal() {
                match services.queue.fail(&key, &error).await {
                    Ok(moved) => reconciliation = moved.is_some(),
                    Err(e) => error!("🧾️ {key} was paid for but could not be kept for reconciliation. {e}"),
                }
            } else if durable {
                if let Err(e) = services.queue.settle(&key).await {
                    warn!("🧾️ Could not drop the rejected request {key}. {e}");
                }
            }
            Err(WorkflowError::BookingFailed { error, queued, reconciliation })
        },
    }
}
