use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::FutureExt;
use pos_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    ledger::{LedgerError, TransactionRepository},
    pos_types::{LineItem, MinorUnits, PaymentMethod, TagIdentity, TransactionIntent, TransactionKind},
    DurableRequestQueue,
    PendingStore,
    QueueConfig,
    SqliteDatabase,
};

use crate::support::{
    fake_ledger::{FakeLedger, Scripted},
    prepare_env::prepare_test_env,
};

mod support;

fn config() -> QueueConfig {
    QueueConfig { sweeps_per_drain: 3, sweep_delay: Duration::from_millis(5), poll_interval: None }
}

fn queue(db: SqliteDatabase, ledger: Arc<FakeLedger>) -> DurableRequestQueue<SqliteDatabase, FakeLedger> {
    DurableRequestQueue::new(db, TransactionRepository::from_shared(ledger), config(), EventProducers::default())
}

fn topup(tag: &str, cents: i64) -> TransactionIntent {
    TransactionIntent::new(TransactionKind::TopUp, MinorUnits::from(cents), TagIdentity::new(tag), PaymentMethod::Cash)
}

#[tokio::test]
async fn queued_requests_survive_a_restart() {
    let env = prepare_test_env();
    let ledger = Arc::new(FakeLedger::with_balance("04AA", 0));
    let intent = topup("04AA", 1000);
    {
        let mut db = env.open().await;
        let before_restart = queue(db.clone(), Arc::clone(&ledger));
        before_restart.enqueue(&intent).await.unwrap();
        db.close().await.unwrap();
    }
    assert_eq!(ledger.book_calls(), 0);

    let after_restart = queue(env.open().await, Arc::clone(&ledger));
    let pending = after_restart.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].intent, intent);
    let report = after_restart.drain().await.unwrap();
    assert_eq!(report.confirmed.len(), 1);
    assert_eq!(report.remaining, 0);
    assert_eq!(ledger.balance("04AA"), MinorUnits::from(1000));
}

#[tokio::test]
async fn transient_failures_converge() {
    let env = prepare_test_env();
    let ledger = Arc::new(FakeLedger::with_balance("04AA", 0));
    ledger.script_booking(Scripted::Fail(LedgerError::Transport("connection reset".into())));
    ledger.script_booking(Scripted::Fail(LedgerError::Server { status: 503, message: "maintenance".into() }));
    let queue = queue(env.open().await, Arc::clone(&ledger));
    queue.enqueue(&topup("04AA", 2500)).await.unwrap();
    let report = queue.drain().await.unwrap();
    assert_eq!(report.sweeps, 3);
    assert_eq!(report.confirmed.len(), 1);
    assert_eq!(report.confirmed[0].new_balance, MinorUnits::from(2500));
    assert!(queue.pending().await.unwrap().is_empty());
    assert_eq!(ledger.book_calls(), 3);
    assert_eq!(ledger.committed(), 1);
}

#[tokio::test]
async fn insufficient_funds_is_tried_once() {
    let env = prepare_test_env();
    let ledger = Arc::new(FakeLedger::with_balance("04AA", 100));
    let reconciled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reconciled);
    let mut hooks = EventHooks::default();
    hooks.on_reconciliation_required(move |ev| {
        let counter = Arc::clone(&counter);
        async move {
            assert_eq!(ev.request.kind, TransactionKind::Sale);
            counter.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    let handler_tasks = handlers.start_handlers().await;

    let db = env.open().await;
    let repository = TransactionRepository::from_shared(Arc::clone(&ledger));
    let queue = DurableRequestQueue::new(db, repository, config(), producers);
    let tag = TagIdentity::new("04AA");
    let sale = TransactionIntent::new(TransactionKind::Sale, MinorUnits::from(700), tag, PaymentMethod::Tag)
        .with_line_items(vec![LineItem::new(12, 2, MinorUnits::from(350))]);
    queue.enqueue(&sale).await.unwrap();
    let report = queue.drain().await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.remaining, 0);
    assert_eq!(ledger.book_calls(), 1);

    let report = queue.drain().await.unwrap();
    assert!(report.is_empty());
    assert_eq!(ledger.book_calls(), 1);
    let listed = queue.reconciliation().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].intent.line_items.len(), 1);
    assert!(listed[0].reason.contains("insufficient funds"));

    // The handler tasks finish once the last producer is gone and every published event was handled.
    drop(queue);
    for task in handler_tasks {
        task.await.unwrap();
    }
    assert_eq!(reconciled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn enqueue_is_idempotent() {
    let env = prepare_test_env();
    let ledger = Arc::new(FakeLedger::with_balance("04AA", 0));
    let queue = queue(env.open().await, Arc::clone(&ledger));
    let intent = topup("04AA", 500);
    queue.enqueue(&intent).await.unwrap();
    queue.enqueue(&intent).await.unwrap();
    assert_eq!(queue.store().fetch_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn worker_picks_up_new_requests() {
    let env = prepare_test_env();
    let ledger = Arc::new(FakeLedger::with_balance("04AA", 0));
    let queue = queue(env.open().await, Arc::clone(&ledger));
    let worker = queue.start_worker();
    queue.enqueue(&topup("04AA", 300)).await.unwrap();
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while !queue.pending().await.unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "The worker never drained the queue");
    assert_eq!(ledger.committed(), 1);
    worker.abort();
}
