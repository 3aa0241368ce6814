use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use pos_common::{helpers::parse_env_var, MinorUnits, Secret};
use pos_engine::{workflow::WorkflowLimits, QueueConfig};
use url::Url;

const DEFAULT_LEDGER_URL: &str = "http://127.0.0.1:8360";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/pos_terminal.db";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_QUEUE_SWEEPS: u32 = 3;
const DEFAULT_QUEUE_SWEEP_DELAY_MS: u64 = 1000;
const DEFAULT_QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_TOPUP_MIN: i64 = 100;
const DEFAULT_TOPUP_MAX: i64 = 50_000;

/// Environment variables that are safe to print. Secrets are deliberately absent.
pub const DISPLAY_ENVS: [&str; 10] = [
    "RUST_LOG",
    "POS_LEDGER_URL",
    "POS_TERMINAL_ID",
    "POS_DATABASE_URL",
    "POS_HTTP_TIMEOUT_SECS",
    "POS_QUEUE_SWEEPS",
    "POS_QUEUE_SWEEP_DELAY_MS",
    "POS_QUEUE_POLL_SECS",
    "POS_TOPUP_MIN",
    "POS_TOPUP_MAX",
];

#[derive(Clone, Debug)]
pub struct TerminalConfig {
    /// Base URL of the ledger API, e.g. `https://ledger.example.com`. Always a well-formed URL.
    pub ledger_url: String,
    /// The identity this terminal presents to the ledger.
    pub terminal_id: String,
    /// Bearer token for the ledger API.
    pub api_token: Secret<String>,
    pub database_url: String,
    /// Transport-level timeout for every ledger call. Timeouts are treated as retryable.
    pub http_timeout: Duration,
    pub queue: QueueConfig,
    pub limits: WorkflowLimits,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            ledger_url: DEFAULT_LEDGER_URL.to_string(),
            terminal_id: String::default(),
            api_token: Secret::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            queue: QueueConfig {
                sweeps_per_drain: DEFAULT_QUEUE_SWEEPS,
                sweep_delay: Duration::from_millis(DEFAULT_QUEUE_SWEEP_DELAY_MS),
                poll_interval: Some(DEFAULT_QUEUE_POLL_INTERVAL),
            },
            limits: WorkflowLimits {
                topup_min: MinorUnits::from(DEFAULT_TOPUP_MIN),
                topup_max: MinorUnits::from(DEFAULT_TOPUP_MAX),
            },
        }
    }
}

impl TerminalConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let ledger_url = env::var("POS_LEDGER_URL")
            .ok()
            .and_then(|s| match Url::parse(&s) {
                Ok(_) => Some(s),
                Err(e) => {
                    error!("🪛️ {s} is not a valid URL for POS_LEDGER_URL. {e} Using the default instead.");
                    None
                },
            })
            .unwrap_or_else(|| {
                warn!("🪛️ Using the default ledger URL, {DEFAULT_LEDGER_URL}.");
                defaults.ledger_url.clone()
            });
        let terminal_id = env::var("POS_TERMINAL_ID").ok().unwrap_or_else(|| {
            error!("🪛️ POS_TERMINAL_ID is not set. Please set it to the identity of this terminal.");
            String::default()
        });
        let api_token = env::var("POS_API_TOKEN").ok().unwrap_or_else(|| {
            error!("🪛️ POS_API_TOKEN is not set. Calls to the ledger will be refused.");
            String::default()
        });
        let database_url = env::var("POS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ POS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            defaults.database_url.clone()
        });
        let http_timeout = Duration::from_secs(env_or("POS_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT.as_secs()));
        let sweeps_per_drain = match env_or("POS_QUEUE_SWEEPS", DEFAULT_QUEUE_SWEEPS) {
            0 => {
                warn!("🪛️ POS_QUEUE_SWEEPS must be at least 1. Using 1.");
                1
            },
            n => n,
        };
        let sweep_delay = Duration::from_millis(env_or("POS_QUEUE_SWEEP_DELAY_MS", DEFAULT_QUEUE_SWEEP_DELAY_MS));
        let poll_interval = match env_or("POS_QUEUE_POLL_SECS", DEFAULT_QUEUE_POLL_INTERVAL.as_secs()) {
            0 => {
                info!("🪛️ Periodic queue polling is disabled. The queue drains on start-up and on new entries.");
                None
            },
            secs => Some(Duration::from_secs(secs)),
        };
        let topup_min = env_or("POS_TOPUP_MIN", defaults.limits.topup_min);
        let topup_max = env_or("POS_TOPUP_MAX", defaults.limits.topup_max);
        let limits = if topup_min > topup_max {
            error!(
                "🪛️ POS_TOPUP_MIN ({topup_min}) is larger than POS_TOPUP_MAX ({topup_max}). Using the default \
                 limits instead."
            );
            defaults.limits.clone()
        } else {
            WorkflowLimits { topup_min, topup_max }
        };
        Self {
            ledger_url,
            terminal_id,
            api_token: Secret::new(api_token),
            database_url,
            http_timeout,
            queue: QueueConfig { sweeps_per_drain, sweep_delay, poll_interval },
            limits,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match parse_env_var::<T>(name) {
        Ok(Some(v)) => v,
        Ok(None) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
        Err(e) => {
            error!("🪛️ {e} Using the default, {default}, instead.");
            default
        },
    }
}
