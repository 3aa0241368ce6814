use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use pos_common::MinorUnits;
use pos_common::major_units;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   IdempotencyKey    ---------------------------------------------------------
/// Client-generated token that accompanies every ledger request for one logical transaction attempt.
///
/// The key is created once, when the transaction intent is created, and is never regenerated while the same attempt is
/// retried. The ledger collapses repeated submissions with the same key into a single effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for IdempotencyKey {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for IdempotencyKey {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self).map_err(|e| ConversionError(format!("Invalid idempotency key {s}: {e}")))
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   TransactionKind   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money is loaded onto an identity tag, paid in cash or by card.
    TopUp,
    /// Goods are sold at a point of sale and paid from the tag balance.
    Sale,
    /// Remaining tag balance is paid out to the customer in cash.
    PayOut,
    /// A ticket is issued and linked to a tag, paid in cash or by card.
    TicketSale,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 4] =
        [TransactionKind::TopUp, TransactionKind::Sale, TransactionKind::PayOut, TransactionKind::TicketSale];
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::TopUp => write!(f, "TopUp"),
            TransactionKind::Sale => write!(f, "Sale"),
            TransactionKind::PayOut => write!(f, "PayOut"),
            TransactionKind::TicketSale => write!(f, "TicketSale"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TopUp" => Ok(Self::TopUp),
            "Sale" => Ok(Self::Sale),
            "PayOut" => Ok(Self::PayOut),
            "TicketSale" => Ok(Self::TicketSale),
            s => Err(ConversionError(format!("Invalid transaction kind: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Paid from the balance held on the identity tag.
    Tag,
}

impl PaymentMethod {
    /// Cash and card payments are taken at the terminal before the booking. Tag payments only move money when the
    /// ledger books them.
    pub fn is_collected_by_terminal(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::Card)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Tag => write!(f, "Tag"),
        }
    }
}

//--------------------------------------     TagIdentity     ---------------------------------------------------------
/// The identity read from an NFC tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagIdentity(String);

impl TagIdentity {
    pub fn new<S: Into<String>>(uid: S) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TagIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       LineItem      ---------------------------------------------------------
/// A product (or ticket type) line for sales and ticket sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i64,
    pub quantity: u32,
    #[serde(with = "major_units")]
    pub unit_price: MinorUnits,
}

impl LineItem {
    pub fn new(product_id: i64, quantity: u32, unit_price: MinorUnits) -> Self {
        Self { product_id, quantity, unit_price }
    }

    /// `None` if the total does not fit in [`MinorUnits`].
    pub fn total(&self) -> Option<MinorUnits> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

//--------------------------------------  TransactionIntent  ---------------------------------------------------------
/// One logical attempt at moving money. Created once; retries of the same attempt reuse the same value (and hence the
/// same idempotency key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionKind,
    #[serde(with = "major_units")]
    pub amount: MinorUnits,
    pub tag: TagIdentity,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
}

impl TransactionIntent {
    pub fn new(kind: TransactionKind, amount: MinorUnits, tag: TagIdentity, payment_method: PaymentMethod) -> Self {
        Self {
            idempotency_key: IdempotencyKey::random(),
            kind,
            amount,
            tag,
            payment_method,
            line_items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_line_items(mut self, items: Vec<LineItem>) -> Self {
        self.line_items = items;
        self
    }
}

impl Display for TransactionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} ({}) for tag {} [{}]",
            self.kind, self.amount, self.payment_method, self.tag, self.idempotency_key
        )
    }
}

//-------------------------------------- PendingTransaction  ---------------------------------------------------------
/// The ledger's answer to a `check` call. Advisory only: balances may change before the booking is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionKind,
    /// A reference the ledger may assign during the check.
    #[serde(default)]
    pub server_reference: Option<String>,
    #[serde(with = "major_units")]
    pub amount: MinorUnits,
    #[serde(with = "major_units::option", default)]
    pub current_balance: Option<MinorUnits>,
}

//-------------------------------------- CompletedTransaction ---------------------------------------------------------
/// The ledger's answer to a successful `book` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTransaction {
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionKind,
    #[serde(default)]
    pub server_reference: Option<String>,
    #[serde(with = "major_units")]
    pub amount: MinorUnits,
    #[serde(with = "major_units")]
    pub old_balance: MinorUnits,
    #[serde(with = "major_units")]
    pub new_balance: MinorUnits,
}

//--------------------------------------    PendingRequest   ---------------------------------------------------------
/// A booking the terminal has committed to but the ledger has not yet confirmed or definitively rejected.
///
/// The set of pending requests is the sole source of truth for unreconciled money movements and lives in durable
/// storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionKind,
    pub intent: TransactionIntent,
    pub attempts_done: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(intent: TransactionIntent) -> Self {
        let now = Utc::now();
        Self {
            idempotency_key: intent.idempotency_key,
            kind: intent.kind,
            intent,
            attempts_done: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

//-------------------------------------- ReconciliationRequest ---------------------------------------------------------
/// A queued booking that the ledger rejected permanently. It is never retried automatically; an operator has to sort
/// it out by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRequest {
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionKind,
    pub intent: TransactionIntent,
    pub attempts_done: i64,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intent_wire_format_uses_major_units() {
        let intent = TransactionIntent::new(
            TransactionKind::TopUp,
            MinorUnits::from(1000),
            TagIdentity::new("04A2B3C4"),
            PaymentMethod::Cash,
        );
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["amount"], "10.00");
        assert_eq!(json["kind"], "TopUp");
        assert_eq!(json["tag"], "04A2B3C4");
        assert!(json.get("line_items").is_none());
        let back: TransactionIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn line_item_totals() {
        let item = LineItem::new(7, 3, MinorUnits::from(450));
        assert_eq!(item.total(), Some(MinorUnits::from(1350)));
        let huge = LineItem::new(7, u32::MAX, MinorUnits::from(3_000_000_000));
        assert_eq!(huge.total(), None);
    }

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in TransactionKind::ALL {
            assert_eq!(kind.to_string().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("Refund".parse::<TransactionKind>().is_err());
    }
}
