mod minor_units;

pub mod helpers;
pub mod op;
mod secret;

pub use minor_units::{major_units, MinorUnits, MoneyConversionError, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
