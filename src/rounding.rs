//! Two-decimal rounding for displayed and persisted standings.
//!
//! Both stages round half away from zero. [`round_cgpa`] works on the binary
//! `f64` and [`to_persisted`] works on the shortest decimal representation of
//! that `f64`, so on binary boundary values the two can disagree by 0.01.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

pub const PLACES: u32 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum RoundingError {
    #[error("cannot store non-finite value {0}")]
    NonFinite(f64),
    #[error("value {value} is out of range for a decimal column: {reason}")]
    OutOfRange { value: f64, reason: String },
}

/// Engine-side rounding applied to the reported CGPA.
pub fn round_cgpa(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixed-point value with exactly two fractional digits for profile storage.
pub fn to_persisted(value: f64) -> Result<Decimal, RoundingError> {
    if !value.is_finite() {
        return Err(RoundingError::NonFinite(value));
    }
    let exact = Decimal::from_str(&value.to_string())
        .or_else(|_| Decimal::from_scientific(&format!("{value:e}")))
        .map_err(|err| RoundingError::OutOfRange {
            value,
            reason: err.to_string(),
        })?;
    let mut rounded = exact.round_dp_with_strategy(PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PLACES);
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_rounding_keeps_two_places() {
        assert_eq!(round_cgpa(3.9), 3.9);
        assert_eq!(round_cgpa(3.876), 3.88);
        assert_eq!(round_cgpa(1.0 / 3.0), 0.33);
        assert_eq!(round_cgpa(0.0), 0.0);
        assert_eq!(round_cgpa(4.4449), 4.44);
    }

    #[test]
    fn persisted_rounding_is_half_up() {
        assert_eq!(to_persisted(3.905).unwrap().to_string(), "3.91");
        assert_eq!(round_cgpa(3.905), 3.91);
        assert_eq!(to_persisted(2.675).unwrap().to_string(), "2.68");
        assert_eq!(to_persisted(3.904).unwrap().to_string(), "3.90");
    }

    #[test]
    fn persisted_values_always_have_two_fractional_digits() {
        assert_eq!(to_persisted(3.9).unwrap().to_string(), "3.90");
        assert_eq!(to_persisted(10.0).unwrap().to_string(), "10.00");
        assert_eq!(to_persisted(0.0).unwrap().scale(), 2);
    }

    #[test]
    fn persisted_rounding_rejects_non_finite() {
        assert_eq!(
            to_persisted(f64::NAN).unwrap_err().to_string(),
            "cannot store non-finite value NaN"
        );
        assert!(matches!(
            to_persisted(f64::INFINITY),
            Err(RoundingError::NonFinite(_))
        ));
    }
}
