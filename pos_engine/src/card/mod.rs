//! Card payment orchestration.
//!
//! The external card SDK is driven through a single [`CardPaymentOrchestrator`]. It owns the one card session that
//! may exist at a time and walks it through the prerequisite actions (see [`ActionDependencyResolver`]) until the
//! target action (usually `Checkout`) succeeds or the SDK reports a failure.
//!
//! SDK results arrive out of band, on a thread the orchestrator does not control. They are funnelled back into the
//! orchestrator task through a [`CardCallbackHandle`], so session state is only ever touched by one task.
mod actions;
mod errors;
mod orchestrator;
mod result_codes;
mod sdk;
mod session;

pub use actions::{ActionDependencyGraph, ActionDependencyResolver, CardAction, NextAction, ACTION_DEPENDENCIES};
pub use errors::CardSdkError;
pub use orchestrator::CardPaymentOrchestrator;
pub use result_codes::{
    CardCallback,
    CardResultCode,
    InterpretedCallback,
    ResultClass,
    EXTRA_MESSAGE,
    EXTRA_RESULT_CODE,
    RESULT_CANCELED,
    RESULT_OK,
};
pub use sdk::{CardCallbackHandle, CardConfig, CardLaunchRequest, CardPayment, CardSdk};
pub use session::{CardOutcome, CardReceipt, CardSessionState, CardSessionStatus, SessionId};
