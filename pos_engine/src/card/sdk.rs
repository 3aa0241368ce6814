//! The interface of the external card SDK.
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};

use log::*;
use pos_common::{MinorUnits, Secret};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::card::{CardAction, CardCallback, CardSdkError, SessionId};

/// Merchant identity the SDK needs for every activity. A fresh snapshot is fetched for each session.
#[derive(Debug, Clone)]
pub struct CardConfig {
    pub merchant_id: String,
    pub affiliate_key: Secret<String>,
    pub terminal_id: String,
    pub currency: String,
}

impl CardConfig {
    /// Names of the fields that are empty. The SDK must never be launched with an incomplete configuration.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.merchant_id.trim().is_empty() {
            missing.push("merchant_id");
        }
        if self.affiliate_key.is_blank() {
            missing.push("affiliate_key");
        }
        if self.terminal_id.trim().is_empty() {
            missing.push("terminal_id");
        }
        if self.currency.trim().is_empty() {
            missing.push("currency");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayment {
    /// Merchant reference. Workflows use the transaction's idempotency key.
    pub reference: String,
    pub amount: MinorUnits,
    pub description: String,
}

impl CardPayment {
    pub fn new<S: Into<String>, D: Into<String>>(reference: S, amount: MinorUnits, description: D) -> Self {
        Self { reference: reference.into(), amount, description: description.into() }
    }
}

/// Everything the SDK needs to start one activity.
#[derive(Debug, Clone)]
pub struct CardLaunchRequest {
    pub session_id: SessionId,
    pub action: CardAction,
    pub config: CardConfig,
    pub payment: Option<CardPayment>,
}

/// The external card SDK.
///
/// `launch` starts the activity and returns immediately. The activity reports its result later, from any thread, by
/// calling [`CardCallbackHandle::deliver`] exactly once.
pub trait CardSdk: Send + Sync + 'static {
    fn launch(&self, request: CardLaunchRequest, callback: CardCallbackHandle) -> Result<(), CardSdkError>;
}

#[derive(Debug)]
pub(crate) enum CallbackPayload {
    Delivered(CardCallback),
    /// Every copy of the handle was dropped without a result being delivered.
    Abandoned,
}

#[derive(Debug)]
pub(crate) struct CallbackEnvelope {
    pub session_id: SessionId,
    pub action: CardAction,
    pub payload: CallbackPayload,
}

struct CallbackSlot {
    session_id: SessionId,
    action: CardAction,
    fired: AtomicBool,
    sender: mpsc::UnboundedSender<CallbackEnvelope>,
}

impl CallbackSlot {
    fn fire(&self, payload: CallbackPayload) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let envelope = CallbackEnvelope { session_id: self.session_id, action: self.action, payload };
        self.sender.send(envelope).is_ok()
    }
}

impl Drop for CallbackSlot {
    fn drop(&mut self) {
        if self.fire(CallbackPayload::Abandoned) {
            let (action, session_id) = (self.action, self.session_id);
            warn!("💳️ {action} activity for session {session_id} went away without reporting a result");
        }
    }
}

/// Single-use completion slot for one dispatched activity.
///
/// The handle can be cloned and moved to any thread. Only the first delivery counts; later ones return `false` and
/// have no effect. If every copy is dropped without a delivery, the session is told that the activity was abandoned.
#[derive(Clone)]
pub struct CardCallbackHandle {
    slot: Arc<CallbackSlot>,
}

impl Debug for CardCallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CardCallbackHandle({} / {})", self.slot.session_id, self.slot.action)
    }
}

impl CardCallbackHandle {
    pub(crate) fn new(
        session_id: SessionId,
        action: CardAction,
        sender: mpsc::UnboundedSender<CallbackEnvelope>,
    ) -> Self {
        let slot = CallbackSlot { session_id, action, fired: AtomicBool::new(false), sender };
        Self { slot: Arc::new(slot) }
    }

    pub fn session_id(&self) -> SessionId {
        self.slot.session_id
    }

    pub fn action(&self) -> CardAction {
        self.slot.action
    }

    /// Hands the activity result to the orchestrator. Returns `false` if a result was already delivered through this
    /// handle, or if the orchestrator has shut down.
    pub fn deliver(&self, activity_result: i32, extras: HashMap<String, String>) -> bool {
        self.deliver_callback(CardCallback::new(activity_result, extras))
    }

    pub fn deliver_callback(&self, callback: CardCallback) -> bool {
        let accepted = self.slot.fire(CallbackPayload::Delivered(callback));
        if !accepted {
            debug!("💳️ Ignoring repeated result for {} in session {}", self.slot.action, self.slot.session_id);
        }
        accepted
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::card::RESULT_OK;

    #[test]
    fn only_the_first_delivery_counts() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = CardCallbackHandle::new(SessionId::from(7), CardAction::Login, tx);
        let copy = handle.clone();
        assert!(handle.deliver_callback(CardCallback::with_code(RESULT_OK, 1, "")));
        assert!(!copy.deliver_callback(CardCallback::with_code(RESULT_OK, 5, "")));
        drop(handle);
        drop(copy);
        let first = rx.try_recv().expect("no callback");
        assert_eq!(first.session_id, SessionId::from(7));
        assert!(matches!(first.payload, CallbackPayload::Delivered(ref cb) if cb.extras["result_code"] == "1"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropping_an_unresolved_handle_abandons_it() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = CardCallbackHandle::new(SessionId::from(1), CardAction::Checkout, tx);
        let moved = handle.clone();
        std::thread::spawn(move || drop(moved)).join().unwrap();
        assert!(rx.try_recv().is_err());
        drop(handle);
        let envelope = rx.try_recv().expect("no envelope");
        assert!(matches!(envelope.payload, CallbackPayload::Abandoned));
    }

    #[test]
    fn incomplete_configurations_are_detected() {
        let config = CardConfig {
            merchant_id: "m-1".into(),
            affiliate_key: Secret::new(String::new()),
            terminal_id: " ".into(),
            currency: "EUR".into(),
        };
        assert_eq!(config.missing_fields(), vec!["affiliate_key", "terminal_id"]);
    }
}
