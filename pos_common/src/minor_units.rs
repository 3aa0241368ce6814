use std::{
    fmt::Display,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of minor units (cents) in one major currency unit.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------     MinorUnits       ---------------------------------------------------------
/// A monetary amount held as an integer number of minor units (cents).
///
/// All arithmetic inside the terminal happens on this type. Conversion to and from decimal major units happens exactly
/// once, at the edge of the system (operator input, configuration and the ledger wire format), via [`FromStr`] /
/// [`MinorUnits::to_major_string`] and the [`major_units`] serde adapter.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented in minor units: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MinorUnits {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MinorUnits {}

impl TryFrom<u64> for MinorUnits {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to MinorUnits")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl TryFrom<f64> for MinorUnits {
    type Error = MoneyConversionError;

    /// Converts a value in major units (as some JSON producers send it) to minor units, rounding to the nearest cent.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let scaled = (value * MINOR_UNITS_PER_MAJOR as f64).round();
        if !scaled.is_finite() || scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
            return Err(MoneyConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(scaled as i64))
    }
}

/// Parses a decimal amount in major units, e.g. `"10"`, `"10.5"` or `"-3.25"`. At most two fractional digits are
/// accepted; anything more precise cannot be represented and is rejected rather than rounded.
impl FromStr for MinorUnits {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        if frac.len() > 2 {
            return Err(MoneyConversionError(format!("'{s}' has more than two decimal places")));
        }
        let whole = match whole {
            "" => 0,
            w => w.parse::<i64>().map_err(|e| MoneyConversionError(e.to_string()))?,
        };
        let cents = format!("{frac:0<2}").parse::<i64>().map_err(|e| MoneyConversionError(e.to_string()))?;
        let value = whole
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| MoneyConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_major_string())
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `None` if the result does not fit.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `None` if the result does not fit.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// Renders the amount in major units with exactly two decimals, e.g. `1000` becomes `"10.00"`.
    pub fn to_major_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        format!("{sign}{}.{:02}", abs / per, abs % per)
    }
}

/// Serde adapter for fields that travel as decimal major units on the wire.
///
/// Serializes as a string (`"10.00"`) and accepts either a string or a JSON number when deserializing.
pub mod major_units {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::MinorUnits;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    pub fn serialize<S: Serializer>(value: &MinorUnits, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_major_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MinorUnits, D::Error> {
        match Wire::deserialize(deserializer)? {
            Wire::Text(s) => s.parse().map_err(de::Error::custom),
            Wire::Integer(i) => MinorUnits::from(i)
                .checked_mul(super::MINOR_UNITS_PER_MAJOR)
                .ok_or_else(|| de::Error::custom(format!("{i} is out of range"))),
            Wire::Float(f) => MinorUnits::try_from(f).map_err(de::Error::custom),
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::{super::MinorUnits, Wire};

        pub fn serialize<S: Serializer>(value: &Option<MinorUnits>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<MinorUnits>, D::Error> {
            use serde::de::Error;
            let wire = Option::<Wire>::deserialize(deserializer)?;
            match wire {
                None => Ok(None),
                Some(Wire::Text(s)) => s.parse().map(Some).map_err(D::Error::custom),
                Some(Wire::Integer(i)) => MinorUnits::from(i)
                    .checked_mul(super::super::MINOR_UNITS_PER_MAJOR)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("{i} is out of range"))),
                Some(Wire::Float(f)) => MinorUnits::try_from(f).map(Some).map_err(D::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[test]
    fn parse_major_units() {
        assert_eq!("10".parse::<MinorUnits>().unwrap(), MinorUnits::from(1000));
        assert_eq!("10.5".parse::<MinorUnits>().unwrap(), MinorUnits::from(1050));
        assert_eq!("0.07".parse::<MinorUnits>().unwrap(), MinorUnits::from(7));
        assert_eq!(".25".parse::<MinorUnits>().unwrap(), MinorUnits::from(25));
        assert_eq!("-3.25".parse::<MinorUnits>().unwrap(), MinorUnits::from(-325));
        assert!("10.001".parse::<MinorUnits>().is_err());
        assert!("ten".parse::<MinorUnits>().is_err());
        assert!("".parse::<MinorUnits>().is_err());
        assert!("1.2.3".parse::<MinorUnits>().is_err());
    }

    #[test]
    fn display_major_units() {
        assert_eq!(MinorUnits::from(1000).to_string(), "10.00");
        assert_eq!(MinorUnits::from(5).to_string(), "0.05");
        assert_eq!(MinorUnits::from(-1234).to_string(), "-12.34");
        assert_eq!(MinorUnits::from_major(3).to_string(), "3.00");
    }

    #[test]
    fn arithmetic() {
        let a = MinorUnits::from(1000);
        let b = MinorUnits::from(250);
        assert_eq!(a - b, MinorUnits::from(750));
        assert_eq!(a + b, MinorUnits::from(1250));
        assert_eq!(b.checked_mul(3), Some(MinorUnits::from(750)));
        assert_eq!(a.checked_add(b), Some(MinorUnits::from(1250)));
        assert_eq!(MinorUnits::from(i64::MAX / 2).checked_mul(3), None);
        assert_eq!(MinorUnits::from(i64::MAX).checked_add(b), None);
    }

    #[derive(Serialize, Deserialize)]
    struct Wire {
        #[serde(with = "major_units")]
        amount: MinorUnits,
        #[serde(with = "major_units::option", default)]
        balance: Option<MinorUnits>,
    }

    #[test]
    fn wire_format() {
        let w = Wire { amount: MinorUnits::from(1000), balance: None };
        assert_eq!(serde_json::to_string(&w).unwrap(), r#"{"amount":"10.00","balance":null}"#);
        let w: Wire = serde_json::from_str(r#"{"amount": 12.5, "balance": "3.10"}"#).unwrap();
        assert_eq!(w.amount, MinorUnits::from(1250));
        assert_eq!(w.balance, Some(MinorUnits::from(310)));
        let w: Wire = serde_json::from_str(r#"{"amount": 7}"#).unwrap();
        assert_eq!(w.amount, MinorUnits::from(700));
        assert_eq!(w.balance, None);
    }
}
