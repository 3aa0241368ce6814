//! Mapping of the card SDK's raw `(activity result, extras)` callbacks onto a closed set of outcomes.
use std::{collections::HashMap, fmt::Display};

/// Activity result reported when the SDK activity finished normally.
pub const RESULT_OK: i32 = -1;
/// Activity result reported when the activity was closed without finishing, e.g. by the back button.
pub const RESULT_CANCELED: i32 = 0;
/// Extras key holding the numeric SDK result code.
pub const EXTRA_RESULT_CODE: &str = "result_code";
/// Extras key holding a human readable message.
pub const EXTRA_MESSAGE: &str = "message";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardResultCode {
    Success = 1,
    Cancelled = 2,
    NotLoggedIn = 3,
    InvalidConfiguration = 4,
    Declined = 5,
    CardReadError = 6,
    Timeout = 7,
    NetworkError = 8,
    TerminalBusy = 9,
    InvalidAmount = 10,
    PermissionDenied = 11,
    UnsupportedAction = 12,
    InternalError = 13,
}

/// Coarse outcome of one SDK activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Success,
    /// The activity ran, but the payment did not go through (declined, cancelled by the customer, ...).
    Failed,
    /// The SDK or its configuration is broken, or the result could not be understood.
    Error,
}

impl CardResultCode {
    pub fn from_code(code: i64) -> Option<Self> {
        use CardResultCode::*;
        let result = match code {
            1 => Success,
            2 => Cancelled,
            3 => NotLoggedIn,
            4 => InvalidConfiguration,
            5 => Declined,
            6 => CardReadError,
            7 => Timeout,
            8 => NetworkError,
            9 => TerminalBusy,
            10 => InvalidAmount,
            11 => PermissionDenied,
            12 => UnsupportedAction,
            13 => InternalError,
            _ => return None,
        };
        Some(result)
    }

    pub fn code(&self) -> i64 {
        *self as i64
    }

    pub fn class(&self) -> ResultClass {
        use CardResultCode::*;
        match self {
            Success => ResultClass::Success,
            Cancelled | Declined | CardReadError | Timeout | InvalidAmount => ResultClass::Failed,
            NotLoggedIn | InvalidConfiguration | NetworkError | TerminalBusy | PermissionDenied | UnsupportedAction |
            InternalError => ResultClass::Error,
        }
    }
}

impl Display for CardResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CardResultCode::*;
        let s = match self {
            Success => "Success",
            Cancelled => "Cancelled",
            NotLoggedIn => "Terminal is not logged in",
            InvalidConfiguration => "Invalid configuration",
            Declined => "Card declined",
            CardReadError => "Card could not be read",
            Timeout => "Timed out",
            NetworkError => "Network error",
            TerminalBusy => "Terminal busy",
            InvalidAmount => "Invalid amount",
            PermissionDenied => "Permission denied",
            UnsupportedAction => "Unsupported action",
            InternalError => "Internal SDK error",
        };
        write!(f, "{s}")
    }
}

/// The raw payload an SDK activity hands back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardCallback {
    pub activity_result: i32,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretedCallback {
    pub class: ResultClass,
    pub code: Option<CardResultCode>,
    pub message: String,
}

impl CardCallback {
    pub fn new(activity_result: i32, extras: HashMap<String, String>) -> Self {
        Self { activity_result, extras }
    }

    /// A callback carrying the given result code and message, as the SDK would send it.
    pub fn with_code(activity_result: i32, code: i64, message: &str) -> Self {
        let mut extras = HashMap::new();
        extras.insert(EXTRA_RESULT_CODE.to_string(), code.to_string());
        if !message.is_empty() {
            extras.insert(EXTRA_MESSAGE.to_string(), message.to_string());
        }
        Self { activity_result, extras }
    }

    pub fn message(&self) -> Option<&str> {
        self.extras.get(EXTRA_MESSAGE).map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
    }

    /// Classifies the callback. Anything that does not map onto a known result code is an `Error`.
    pub fn interpret(&self) -> InterpretedCallback {
        let raw = self.extras.get(EXTRA_RESULT_CODE).map(|s| s.trim());
        let code = match raw {
            None if self.activity_result == RESULT_CANCELED => CardResultCode::Cancelled,
            None => return self.error(None, format!("No result code (activity result {})", self.activity_result)),
            Some(raw) => match raw.parse::<i64>().ok().and_then(CardResultCode::from_code) {
                Some(code) => code,
                None => return self.error(None, format!("Unknown card result code '{raw}'")),
            },
        };
        if code == CardResultCode::Success && self.activity_result != RESULT_OK {
            let message = format!("Success reported with activity result {}", self.activity_result);
            return self.error(Some(code), message);
        }
        let message = match self.message() {
            Some(m) => format!("{code}. {m}"),
            None => code.to_string(),
        };
        InterpretedCallback { class: code.class(), code: Some(code), message }
    }

    fn error(&self, code: Option<CardResultCode>, reason: String) -> InterpretedCallback {
        let message = match self.message() {
            Some(m) => format!("{reason}. {m}"),
            None => reason,
        };
        InterpretedCallback { class: ResultClass::Error, code, message }
    }
}
