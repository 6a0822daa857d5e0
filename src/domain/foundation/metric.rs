//! Fixed-point helpers for persisted psychometric values.
//!
//! All statistics are accumulated in `rust_decimal::Decimal` and rounded once,
//! half-up, when they are stored. Flags, statuses and classes are decided on
//! the value at [`DECISION_SCALE`], never on the stored one, so a true 0.19996
//! is below a 0.20 bound even though it is stored as 0.2000. Only
//! transcendental steps that have no exact decimal form (normal tail
//! probabilities) pass through `f64`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept on every persisted metric.
pub const METRIC_SCALE: u32 = 4;

/// Rounds a value to [`METRIC_SCALE`] places, half away from zero.
pub fn round_metric(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(METRIC_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Number of decimal places seen by threshold comparisons.
///
/// Clears the last-digit residue of non-terminating divisions so that an
/// exactly uncorrelated item does not read as -1e-27.
pub const DECISION_SCALE: u32 = 12;

/// Rounds a value to [`DECISION_SCALE`] places for threshold comparisons.
pub fn decision_metric(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECISION_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Exact ratio `numerator / denominator`, `None` for an empty denominator.
pub fn ratio(numerator: usize, denominator: usize) -> Option<Decimal> {
    if denominator == 0 {
        return None;
    }
    Some(Decimal::from(numerator) / Decimal::from(denominator))
}

/// Converts an `f64` result back into the decimal domain.
///
/// Non-finite input maps to zero.
pub fn from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Converts a decimal to `f64` for functions without a decimal implementation.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
