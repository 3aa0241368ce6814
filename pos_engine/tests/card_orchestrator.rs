use std::{sync::Arc, time::Duration};

use pos_engine::{
    card::{CardAction, CardPayment, CardPaymentOrchestrator},
    pos_types::MinorUnits,
    CardOutcome,
    CardSessionStatus,
};

use crate::support::fake_card::{FakeCardSdk, FakeConfigSource, ScriptedResult};

mod support;

fn start(sdk: &Arc<FakeCardSdk>, config: FakeConfigSource) -> CardPaymentOrchestrator {
    let _ = env_logger::try_init();
    let (orchestrator, _handle) = CardPaymentOrchestrator::start(Arc::clone(sdk), Arc::new(config));
    orchestrator
}

fn payment(cents: i64) -> CardPayment {
    CardPayment::new("3f1c2b5e-payment", MinorUnits::from(cents), "Top-up")
}

#[tokio::test]
async fn checkout_logs_in_first() {
    let sdk = Arc::new(FakeCardSdk::default());
    let orchestrator = start(&sdk, FakeConfigSource::default());
    let mut status = orchestrator.status();
    assert_eq!(*status.borrow(), CardSessionStatus::Idle);

    let outcome = orchestrator.pay(payment(1500)).await;
    let CardOutcome::Success(receipt) = outcome else {
        panic!("Expected a successful payment, got {outcome:?}");
    };
    assert_eq!(receipt.target, CardAction::Checkout);
    assert_eq!(receipt.payment, Some(payment(1500)));
    assert_eq!(sdk.launched_actions(), vec![CardAction::Login, CardAction::Checkout]);
    assert!(status.has_changed().unwrap());
    assert!(matches!(*status.borrow_and_update(), CardSessionStatus::Success { .. }));

    let launches = sdk.launches();
    assert!(launches[0].payment.is_some());
    assert_eq!(launches[1].config.terminal_id, "terminal-3");
    assert_eq!(launches[0].session_id, launches[1].session_id);
}

#[tokio::test]
async fn checkout_goes_straight_through_when_logged_in() {
    let sdk = Arc::new(FakeCardSdk::default());
    let orchestrator = start(&sdk, FakeConfigSource::default());
    assert!(orchestrator.login().await.is_success());
    assert!(orchestrator.pay(payment(800)).await.is_success());
    assert_eq!(sdk.launched_actions(), vec![CardAction::Login, CardAction::Checkout]);
}

#[tokio::test]
async fn duplicate_callbacks_are_ignored() {
    let sdk = Arc::new(FakeCardSdk::default());
    sdk.script(CardAction::Login, ScriptedResult::code(1).twice());
    let orchestrator = start(&sdk, FakeConfigSource::default());
    assert!(orchestrator.pay(payment(800)).await.is_success());
    assert_eq!(sdk.launched_actions(), vec![CardAction::Login, CardAction::Checkout]);
    // Give the delivering thread time to try its second delivery.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sdk.accepted_deliveries(), 2);
    assert_eq!(sdk.refused_deliveries(), 1);
}

#[tokio::test]
async fn unknown_result_codes_are_errors() {
    let sdk = Arc::new(FakeCardSdk::default());
    sdk.script(CardAction::Login, ScriptedResult::raw("42"));
    let orchestrator = start(&sdk, FakeConfigSource::default());
    let outcome = orchestrator.pay(payment(800)).await;
    assert!(matches!(outcome, CardOutcome::Error(ref m) if m.contains("Unknown card result code '42'")), "{outcome:?}");
    assert_eq!(sdk.launched_actions(), vec![CardAction::Login]);
    assert!(matches!(orchestrator.current_status(), CardSessionStatus::Error { session_id: Some(_), .. }));
}

#[tokio::test]
async fn declined_checkout_fails() {
    let sdk = Arc::new(FakeCardSdk::default());
    sdk.script(CardAction::Checkout, ScriptedResult::code(5));
    let orchestrator = start(&sdk, FakeConfigSource::default());
    let outcome = orchestrator.pay(payment(800)).await;
    assert!(matches!(outcome, CardOutcome::Failed(ref m) if m.starts_with("Card declined")), "{outcome:?}");
    assert!(matches!(orchestrator.current_status(), CardSessionStatus::Failed { .. }));
}

#[tokio::test]
async fn missing_configuration_never_reaches_the_sdk() {
    let sdk = Arc::new(FakeCardSdk::default());
    let orchestrator = start(&sdk, FakeConfigSource::unavailable());
    let outcome = orchestrator.pay(payment(800)).await;
    assert!(matches!(outcome, CardOutcome::Error(ref m) if m.contains("card payment configuration")), "{outcome:?}");
    assert!(sdk.launched_actions().is_empty());
    assert!(matches!(orchestrator.current_status(), CardSessionStatus::Error { session_id: None, .. }));
}

#[tokio::test]
async fn incomplete_configuration_never_reaches_the_sdk() {
    let sdk = Arc::new(FakeCardSdk::default());
    let orchestrator = start(&sdk, FakeConfigSource::without_merchant());
    let message = match orchestrator.pay(payment(800)).await {
        CardOutcome::Error(message) => message,
        other => panic!("expected a refusal, got {other:?}"),
    };
    assert!(message.starts_with("The card payment configuration is incomplete."), "{message}");
    assert!(message.contains("merchant_id"), "{message}");
    assert!(sdk.launched_actions().is_empty());
}

#[tokio::test]
async fn one_session_at_a_time() {
    let sdk = Arc::new(FakeCardSdk::default());
    sdk.script(CardAction::Login, ScriptedResult::code(1).delayed(Duration::from_millis(200)));
    let orchestrator = start(&sdk, FakeConfigSource::default());
    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.pay(payment(800)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(orchestrator.current_status(), CardSessionStatus::Started { .. }));
    let second = orchestrator.settings().await;
    assert!(matches!(second, CardOutcome::Error(ref m) if m.contains("still in progress")), "{second:?}");
    assert!(first.await.unwrap().is_success());
    assert_eq!(sdk.launched_actions(), vec![CardAction::Login, CardAction::Checkout]);
}

#[tokio::test]
async fn abandoned_caller_does_not_cancel_the_session() {
    let sdk = Arc::new(FakeCardSdk::default());
    sdk.script(CardAction::Checkout, ScriptedResult::code(1).delayed(Duration::from_millis(100)));
    let orchestrator = start(&sdk, FakeConfigSource::default());
    let timed_out = tokio::time::timeout(Duration::from_millis(30), orchestrator.pay(payment(800))).await;
    assert!(timed_out.is_err());
    let mut status = orchestrator.status();
    let finished = tokio::time::timeout(Duration::from_secs(2), status.wait_for(|s| s.is_terminal())).await;
    assert!(matches!(*finished.unwrap().unwrap(), CardSessionStatus::Success { .. }));
}
