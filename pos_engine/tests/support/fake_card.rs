use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use pos_common::Secret;
use pos_engine::{
    card::{
        CardAction,
        CardCallbackHandle,
        CardConfig,
        CardLaunchRequest,
        CardSdk,
        CardSdkError,
        EXTRA_MESSAGE,
        EXTRA_RESULT_CODE,
        RESULT_OK,
    },
    ledger::{CardConfigSource, ConfigFetchError, LedgerError},
};

#[derive(Debug, Clone)]
pub struct ScriptedResult {
    pub code: String,
    pub delay: Duration,
    /// Deliver the same result twice, as a misbehaving SDK might.
    pub twice: bool,
}

impl ScriptedResult {
    pub fn code(code: i64) -> Self {
        Self { code: code.to_string(), delay: Duration::from_millis(5), twice: false }
    }

    pub fn raw(code: &str) -> Self {
        Self { code: code.to_string(), delay: Duration::from_millis(5), twice: false }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn twice(mut self) -> Self {
        self.twice = true;
        self
    }
}

/// Card SDK that answers from its own OS thread, like the real activity callbacks.
#[derive(Default)]
pub struct FakeCardSdk {
    scripts: Mutex<HashMap<CardAction, VecDeque<ScriptedResult>>>,
    launched: Mutex<Vec<CardLaunchRequest>>,
    accepted: Arc<AtomicUsize>,
    refused: Arc<AtomicUsize>,
}

impl FakeCardSdk {
    /// Queues the result of the next launch of `action`. Unscripted launches succeed.
    pub fn script(&self, action: CardAction, result: ScriptedResult) -> &Self {
        self.scripts.lock().unwrap().entry(action).or_default().push_back(result);
        self
    }

    pub fn launched_actions(&self) -> Vec<CardAction> {
        self.launched.lock().unwrap().iter().map(|r| r.action).collect()
    }

    pub fn launches(&self) -> Vec<CardLaunchRequest> {
        self.launched.lock().unwrap().clone()
    }

    /// Deliveries the orchestrator accepted.
    pub fn accepted_deliveries(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Deliveries refused because the handle had already been used.
    pub fn refused_deliveries(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }
}

impl CardSdk for FakeCardSdk {
    fn launch(&self, request: CardLaunchRequest, callback: CardCallbackHandle) -> Result<(), CardSdkError> {
        let action = request.action;
        self.launched.lock().unwrap().push(request);
        let result = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&action)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| ScriptedResult::code(1));
        let (accepted, refused) = (Arc::clone(&self.accepted), Arc::clone(&self.refused));
        std::thread::spawn(move || {
            std::thread::sleep(result.delay);
            let mut extras = HashMap::new();
            extras.insert(EXTRA_RESULT_CODE.to_string(), result.code.clone());
            extras.insert(EXTRA_MESSAGE.to_string(), format!("{action} finished"));
            let deliveries = if result.twice { 2 } else { 1 };
            for _ in 0..deliveries {
                let counter = if callback.deliver(RESULT_OK, extras.clone()) { &accepted } else { &refused };
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeConfigSource {
    pub unavailable: bool,
    pub without_merchant: bool,
}

impl FakeConfigSource {
    pub fn unavailable() -> Self {
        Self { unavailable: true, ..Default::default() }
    }

    pub fn without_merchant() -> Self {
        Self { without_merchant: true, ..Default::default() }
    }
}

#[async_trait]
impl CardConfigSource for FakeConfigSource {
    async fn fetch_card_config(&self) -> Result<CardConfig, ConfigFetchError> {
        if self.unavailable {
            return Err(LedgerError::Transport("connection refused".into()).into());
        }
        Ok(CardConfig {
            merchant_id: if self.without_merchant { String::new() } else { "merchant-7".into() },
            affiliate_key: Secret::new("affiliate-key".into()),
            terminal_id: "terminal-3".into(),
            currency: "EUR".into(),
        })
    }
}
