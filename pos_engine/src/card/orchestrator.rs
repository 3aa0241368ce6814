use std::sync::Arc;

use log::*;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    card::{
        sdk::{CallbackEnvelope, CallbackPayload},
        ActionDependencyResolver,
        CardAction,
        CardCallbackHandle,
        CardConfig,
        CardLaunchRequest,
        CardOutcome,
        CardPayment,
        CardReceipt,
        CardResultCode,
        CardSdk,
        CardSessionState,
        CardSessionStatus,
        NextAction,
        ResultClass,
        SessionId,
    },
    ledger::{CardConfigSource, ConfigFetchError},
};

const COMMAND_BUFFER: usize = 16;

enum Command {
    Run { target: CardAction, payment: Option<CardPayment>, reply: oneshot::Sender<CardOutcome> },
}

/// Handle to the card payment orchestrator.
///
/// The orchestrator runs as its own task and owns the card session exclusively. Every entry point sends a message to
/// that task and waits for the session's terminal outcome. Handles are cheap to clone; the task shuts down once every
/// handle has been dropped and no session is running.
///
/// Only one session can run at a time. A call made while another session is in progress resolves to
/// [`CardOutcome::Error`] without touching the running session.
#[derive(Clone)]
pub struct CardPaymentOrchestrator {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<CardSessionStatus>,
}

impl CardPaymentOrchestrator {
    pub fn start<S, C>(sdk: Arc<S>, config_source: Arc<C>) -> (Self, JoinHandle<()>)
    where
        S: CardSdk,
        C: CardConfigSource + 'static,
    {
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status) = watch::channel(CardSessionStatus::Idle);
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();
        let actor = OrchestratorActor {
            sdk,
            config_source,
            resolver: ActionDependencyResolver::default(),
            status: status_tx,
            callback_tx,
            session: None,
            logged_in: false,
            last_session_id: 0,
        };
        let handle = tokio::spawn(actor.run(command_rx, callback_rx));
        (Self { commands, status }, handle)
    }

    /// Runs a full card payment: any prerequisite actions first, then `Checkout`.
    pub async fn pay(&self, payment: CardPayment) -> CardOutcome {
        self.run(CardAction::Checkout, Some(payment)).await
    }

    pub async fn login(&self) -> CardOutcome {
        self.run(CardAction::Login, None).await
    }

    /// Opens the SDK's settings activity, logging in first if necessary.
    pub async fn settings(&self) -> CardOutcome {
        self.run(CardAction::Settings, None).await
    }

    /// A stream of status updates. Every session moves from `Started` to a terminal value.
    pub fn status(&self) -> watch::Receiver<CardSessionStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> CardSessionStatus {
        self.status.borrow().clone()
    }

    async fn run(&self, target: CardAction, payment: Option<CardPayment>) -> CardOutcome {
        let (reply, outcome) = oneshot::channel();
        if self.commands.send(Command::Run { target, payment, reply }).await.is_err() {
            return CardOutcome::Error("The card payment service is not running".into());
        }
        outcome.await.unwrap_or_else(|_| CardOutcome::Error("The card payment service stopped unexpectedly".into()))
    }
}

struct ActiveSession {
    state: CardSessionState,
    reply: oneshot::Sender<CardOutcome>,
}

struct OrchestratorActor<S, C> {
    sdk: Arc<S>,
    config_source: Arc<C>,
    resolver: ActionDependencyResolver,
    status: watch::Sender<CardSessionStatus>,
    callback_tx: mpsc::UnboundedSender<CallbackEnvelope>,
    session: Option<ActiveSession>,
    // Survives sessions. Cleared when the SDK says the terminal is not logged in.
    logged_in: bool,
    last_session_id: u64,
}

impl<S, C> OrchestratorActor<S, C>
where
    S: CardSdk,
    C: CardConfigSource + 'static,
{
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut callbacks: mpsc::UnboundedReceiver<CallbackEnvelope>,
    ) {
        debug!("💳️ Card payment orchestrator started");
        let mut accepting = true;
        loop {
            tokio::select! {
                cmd = commands.recv(), if accepting => match cmd {
                    Some(Command::Run { target, payment, reply }) => self.start_session(target, payment, reply).await,
                    None => accepting = false,
                },
                Some(envelope) = callbacks.recv() => self.on_callback(envelope),
                else => break,
            }
            if !accepting && self.session.is_none() {
                break;
            }
        }
        debug!("💳️ Card payment orchestrator has shut down");
    }

    async fn start_session(
        &mut self,
        target: CardAction,
        payment: Option<CardPayment>,
        reply: oneshot::Sender<CardOutcome>,
    ) {
        if let Some(active) = &self.session {
            let message = format!("Card session {} is still in progress", active.state.session_id());
            warn!("💳️ Refusing to start a {target} session. {message}");
            let _ = reply.send(CardOutcome::Error(message));
            return;
        }
        if let Err(message) = check_payment(target, payment.as_ref()) {
            self.refuse(reply, message);
            return;
        }
        let config = match self.config_source.fetch_card_config().await.and_then(complete_config) {
            Ok(config) => config,
            Err(e) => {
                self.refuse(reply, e.to_string());
                return;
            },
        };
        self.last_session_id += 1;
        let session_id = SessionId::from(self.last_session_id);
        let mut state = CardSessionState::new(session_id, target, config, payment);
        if self.logged_in {
            state.mark_done(CardAction::Login);
        }
        info!("💳️ Card session {session_id} started for {target}");
        self.status.send_replace(CardSessionStatus::Started { session_id });
        self.session = Some(ActiveSession { state, reply });
        self.advance();
    }

    /// Fails a session before it started. The SDK is not touched.
    fn refuse(&mut self, reply: oneshot::Sender<CardOutcome>, message: String) {
        error!("💳️ {message}");
        self.status.send_replace(CardSessionStatus::Error { session_id: None, message: message.clone() });
        let _ = reply.send(CardOutcome::Error(message));
    }

    fn advance(&mut self) {
        let Some(active) = self.session.as_ref() else {
            return;
        };
        let next = self.resolver.next_action(active.state.target(), active.state.actions_done());
        match next {
            NextAction::NothingToDo => {
                let message = format!("{} completed", active.state.target());
                self.finish(ResultClass::Success, message);
            },
            NextAction::Dispatch(action) => self.dispatch(action),
        }
    }

    fn dispatch(&mut self, action: CardAction) {
        let Some(active) = self.session.as_mut() else {
            return;
        };
        let session_id = active.state.session_id();
        active.state.set_awaiting(Some(action));
        let request = CardLaunchRequest {
            session_id,
            action,
            config: active.state.config().clone(),
            payment: active.state.payment().cloned(),
        };
        let handle = CardCallbackHandle::new(session_id, action, self.callback_tx.clone());
        debug!("💳️ Session {session_id}: launching {action}");
        if let Err(e) = self.sdk.launch(request, handle) {
            self.finish(ResultClass::Error, format!("Could not start {action}. {e}"));
        }
    }

    fn on_callback(&mut self, envelope: CallbackEnvelope) {
        let CallbackEnvelope { session_id, action, payload } = envelope;
        let expected = self
            .session
            .as_ref()
            .map(|s| s.state.session_id() == session_id && s.state.awaiting() == Some(action))
            .unwrap_or(false);
        if !expected {
            debug!("💳️ Ignoring stale {action} result for session {session_id}");
            return;
        }
        if let Some(active) = self.session.as_mut() {
            active.state.set_awaiting(None);
        }
        let callback = match payload {
            CallbackPayload::Delivered(callback) => callback,
            CallbackPayload::Abandoned => {
                self.finish(ResultClass::Error, format!("The {action} activity ended without reporting a result"));
                return;
            },
        };
        let result = callback.interpret();
        debug!("💳️ Session {session_id}: {action} returned {:?}. {}", result.class, result.message);
        match result.class {
            ResultClass::Success => {
                if action == CardAction::Login {
                    self.logged_in = true;
                }
                if let Some(active) = self.session.as_mut() {
                    active.state.mark_done(action);
                }
                self.advance();
            },
            ResultClass::Failed => self.finish(ResultClass::Failed, result.message),
            ResultClass::Error => {
                if result.code == Some(CardResultCode::NotLoggedIn) {
                    info!("💳️ The card terminal is logged out. The next session will log in first");
                    self.logged_in = false;
                }
                self.finish(ResultClass::Error, result.message)
            },
        }
    }

    fn finish(&mut self, class: ResultClass, message: String) {
        let Some(ActiveSession { state, reply }) = self.session.take() else {
            return;
        };
        let session_id = state.session_id();
        let (status, outcome) = match class {
            ResultClass::Success => {
                info!("💳️ Card session {session_id} succeeded. {message}");
                let receipt = CardReceipt {
                    session_id,
                    target: state.target(),
                    payment: state.payment().cloned(),
                    message: message.clone(),
                };
                (CardSessionStatus::Success { session_id, message }, CardOutcome::Success(receipt))
            },
            ResultClass::Failed => {
                warn!("💳️ Card session {session_id} failed. {message}");
                (CardSessionStatus::Failed { session_id, message: message.clone() }, CardOutcome::Failed(message))
            },
            ResultClass::Error => {
                error!("💳️ Card session {session_id} ended in error. {message}");
                let status = CardSessionStatus::Error { session_id: Some(session_id), message: message.clone() };
                (status, CardOutcome::Error(message))
            },
        };
        self.status.send_replace(status);
        if reply.send(outcome).is_err() {
            debug!("💳️ Nobody is waiting for the outcome of session {session_id}");
        }
    }
}

/// The SDK must never be launched with empty fields.
fn complete_config(config: CardConfig) -> Result<CardConfig, ConfigFetchError> {
    let missing = config.missing_fields();
    if missing.is_empty() {
        Ok(config)
    } else {
        Err(ConfigFetchError::Incomplete(format!("Missing: {}", missing.join(", "))))
    }
}

fn check_payment(target: CardAction, payment: Option<&CardPayment>) -> Result<(), String> {
    match (target, payment) {
        (CardAction::Checkout, None) => Err("No payment was given for checkout".into()),
        (CardAction::Checkout, Some(p)) if !p.amount.is_positive() => {
            Err(format!("Card payments must be positive, not {}", p.amount))
        },
        _ => Ok(()),
    }
}
