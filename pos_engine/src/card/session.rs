use std::{collections::BTreeSet, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::card::{CardAction, CardConfig, CardPayment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl SessionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of one card session. Created fresh for every `pay`, `login` or `settings` call.
#[derive(Debug, Clone)]
pub struct CardSessionState {
    session_id: SessionId,
    target: CardAction,
    config: CardConfig,
    payment: Option<CardPayment>,
    actions_done: BTreeSet<CardAction>,
    awaiting: Option<CardAction>,
}

impl CardSessionState {
    pub fn new(session_id: SessionId, target: CardAction, config: CardConfig, payment: Option<CardPayment>) -> Self {
        Self { session_id, target, config, payment, actions_done: BTreeSet::new(), awaiting: None }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn target(&self) -> CardAction {
        self.target
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    pub fn payment(&self) -> Option<&CardPayment> {
        self.payment.as_ref()
    }

    pub fn actions_done(&self) -> &BTreeSet<CardAction> {
        &self.actions_done
    }

    /// The set of completed actions only ever grows.
    pub fn mark_done(&mut self, action: CardAction) {
        self.actions_done.insert(action);
    }

    pub fn awaiting(&self) -> Option<CardAction> {
        self.awaiting
    }

    pub(crate) fn set_awaiting(&mut self, action: Option<CardAction>) {
        self.awaiting = action;
    }
}

/// Proof that a card session reached its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardReceipt {
    pub session_id: SessionId,
    pub target: CardAction,
    pub payment: Option<CardPayment>,
    pub message: String,
}

/// How a card session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardOutcome {
    Success(CardReceipt),
    /// The SDK ran but the payment did not go through.
    Failed(String),
    /// The session could not be run, or the SDK misbehaved.
    Error(String),
}

impl CardOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CardOutcome::Success(_))
    }
}

/// Published progress of the orchestrator: `Idle → Started → {Success | Failed | Error}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CardSessionStatus {
    #[default]
    Idle,
    Started { session_id: SessionId },
    Success { session_id: SessionId, message: String },
    Failed { session_id: SessionId, message: String },
    /// `session_id` is `None` when the session could not even be started.
    Error { session_id: Option<SessionId>, message: String },
}

impl CardSessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failed { .. } | Self::Error { .. })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Idle => None,
            Self::Started { session_id } | Self::Success { session_id, .. } | Self::Failed { session_id, .. } => {
                Some(*session_id)
            },
            Self::Error { session_id, .. } => *session_id,
        }
    }
}

impl Display for CardSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Started { session_id } => write!(f, "Card session {session_id} started"),
            Self::Success { session_id, message } => write!(f, "Card session {session_id} succeeded. {message}"),
            Self::Failed { session_id, message } => write!(f, "Card session {session_id} failed. {message}"),
            Self::Error { session_id: Some(id), message } => write!(f, "Card session {id} error. {message}"),
            Self::Error { session_id: None, message } => write!(f, "Card session could not start. {message}"),
        }
    }
}
