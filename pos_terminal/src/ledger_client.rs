//! HTTP client for the remote ledger API.
//!
//! Every transaction kind has a `check` and a `book` endpoint under `api/v1/<kind>/`. Both take the transaction intent
//! as JSON (amounts in decimal major units) and carry the intent's idempotency key in the `Idempotency-Key` header.
//! Non-success responses are mapped onto [`LedgerError`] by [`classify_response`], which is what the retry policy
//! downstream keys off.
use async_trait::async_trait;
use log::*;
use pos_common::Secret;
use pos_engine::{
    card::CardConfig,
    ledger::{CardConfigSource, ConfigFetchError, LedgerApi, LedgerError, RejectionReason},
    pos_types::{CompletedTransaction, PendingTransaction, TransactionIntent, TransactionKind},
};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{config::TerminalConfig, errors::TerminalError};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Check,
    Book,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Check => "check",
            Phase::Book => "book",
        }
    }
}

fn kind_path(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::TopUp => "topup",
        TransactionKind::Sale => "sale",
        TransactionKind::PayOut => "payout",
        TransactionKind::TicketSale => "ticket_sale",
    }
}

#[derive(Serialize)]
struct LedgerRequest<'a> {
    terminal_id: &'a str,
    #[serde(flatten)]
    intent: &'a TransactionIntent,
}

/// The body the ledger sends with every non-success response.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    /// Machine-readable business error, e.g. `insufficient_funds`.
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardConfigResponse {
    merchant_id: String,
    affiliate_key: String,
    #[serde(default)]
    terminal_id: Option<String>,
    currency: String,
}

#[derive(Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: Url,
    terminal_id: String,
    api_token: Secret<String>,
}

impl std::fmt::Debug for HttpLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HttpLedgerClient({}, {})", self.base_url, self.terminal_id)
    }
}

impl HttpLedgerClient {
    pub fn new(config: &TerminalConfig) -> Result<Self, TerminalError> {
        let mut base_url = Url::parse(&config.ledger_url)
            .map_err(|e| TerminalError::ConfigurationError(format!("Invalid ledger URL {}. {e}", config.ledger_url)))?;
        // Without the trailing slash, `join` would replace the last path segment of the base.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if config.api_token.is_blank() {
            warn!("🏦️ No API token is configured. The ledger will refuse every call from this terminal.");
        }
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("POS Terminal")
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| TerminalError::HttpClientError(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            terminal_id: config.terminal_id.clone(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    pub fn url(&self, path: &str) -> Result<Url, LedgerError> {
        self.base_url.join(path).map_err(|e| LedgerError::Transport(format!("Failed to join URL: {e}")))
    }

    fn endpoint(&self, kind: TransactionKind, phase: Phase) -> Result<Url, LedgerError> {
        self.url(&format!("api/v1/{}/{}", kind_path(kind), phase.as_str()))
    }

    async fn post_intent<T: DeserializeOwned>(
        &self,
        intent: &TransactionIntent,
        phase: Phase,
    ) -> Result<T, LedgerError> {
        let url = self.endpoint(intent.kind, phase)?;
        trace!("🏦️ POST {url} for {intent}");
        let body = LedgerRequest { terminal_id: &self.terminal_id, intent };
        let res = self
            .client
            .post(url)
            .bearer_auth(self.api_token.reveal())
            .header(IDEMPOTENCY_KEY_HEADER, intent.idempotency_key.to_string())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = res.status();
        let text = res.text().await.map_err(transport_error)?;
        let result = classify_response(status, &text);
        match &result {
            Ok(_) => debug!("🏦️ {} {} of {} accepted", intent.kind, phase.as_str(), intent.idempotency_key),
            Err(e) => warn!("🏦️ {} {} of {} failed. {e}", intent.kind, phase.as_str(), intent.idempotency_key),
        }
        result
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Timeout(e.to_string())
    } else {
        LedgerError::Transport(e.to_string())
    }
}

/// Maps an HTTP response from the ledger onto the typed result.
///
/// A 4xx response that carries a business error `code` is a [`LedgerError::Rejected`], whatever the exact status.
/// Everything else is classified by status alone.
pub fn classify_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, LedgerError> {
    if status.is_success() {
        return serde_json::from_str(body)
            .map_err(|e| LedgerError::InvalidResponse(format!("Could not deserialize the ledger response. {e}")));
    }
    let error_body = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
    let message = error_body.error.unwrap_or_else(|| body.trim().to_string());
    if status.is_client_error() {
        if let Some(code) = error_body.code {
            return Err(LedgerError::rejected(RejectionReason::from_code(&code), message));
        }
    }
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LedgerError::AccessDenied(message),
        StatusCode::NOT_FOUND => LedgerError::NotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LedgerError::Timeout(message),
        s if s.is_server_error() => LedgerError::Server { status: s.as_u16(), message },
        s if s.is_client_error() => LedgerError::BadRequest(format!("{s}. {message}")),
        // Redirects and informational statuses mean the terminal points at the wrong place. Retrying will not help.
        s => LedgerError::BadRequest(format!("Unexpected status {s}. Check the ledger URL. {message}")),
    };
    Err(err)
}

#[async_trait]
impl LedgerApi for HttpLedgerClient {
    async fn check_topup(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.post_intent(intent, Phase::Check).await
    }

    async fn book_topup(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.post_intent(intent, Phase::Book).await
    }

    async fn check_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.post_intent(intent, Phase::Check).await
    }

    async fn book_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.post_intent(intent, Phase::Book).await
    }

    async fn check_payout(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.post_intent(intent, Phase::Check).await
    }

    async fn book_payout(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.post_intent(intent, Phase::Book).await
    }

    async fn check_ticket_sale(&self, intent: &TransactionIntent) -> Result<PendingTransaction, LedgerError> {
        self.post_intent(intent, Phase::Check).await
    }

    async fn book_ticket_sale(&self, intent: &TransactionIntent) -> Result<CompletedTransaction, LedgerError> {
        self.post_intent(intent, Phase::Book).await
    }
}

#[async_trait]
impl CardConfigSource for HttpLedgerClient {
    async fn fetch_card_config(&self) -> Result<CardConfig, ConfigFetchError> {
        let url = self.url(&format!("api/v1/terminals/{}/card_config", self.terminal_id))?;
        trace!("🏦️ GET {url}");
        let res = self.client.get(url).bearer_auth(self.api_token.reveal()).send().await.map_err(transport_error)?;
        let status = res.status();
        let text = res.text().await.map_err(transport_error)?;
        let response = classify_response::<CardConfigResponse>(status, &text)?;
        debug!("🏦️ Fetched card configuration for merchant {}", response.merchant_id);
        Ok(CardConfig {
            merchant_id: response.merchant_id,
            affiliate_key: Secret::new(response.affiliate_key),
            terminal_id: response.terminal_id.unwrap_or_else(|| self.terminal_id.clone()),
            currency: response.currency,
        })
    }
}
