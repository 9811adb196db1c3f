//! Conversion between the source system's decimal major units and the
//! integer minor units (cents) stored by the target schema.

use crate::error::CoreError;

/// Convert a major-unit amount to minor units.
///
/// `None` stays `None`; an absent amount is never stored as zero.
/// Fractional cents round half away from zero.
///
/// ```
/// use tradeflow_core::currency::to_minor_units;
///
/// assert_eq!(to_minor_units(Some(12.345)).unwrap(), Some(1235));
/// assert_eq!(to_minor_units(None).unwrap(), None);
/// ```
pub fn to_minor_units(amount: Option<f64>) -> Result<Option<i64>, CoreError> {
    let Some(amount) = amount else {
        return Ok(None);
    };
    if !amount.is_finite() {
        return Err(CoreError::NonFiniteAmount(amount));
    }
    checked_cents((amount * 100.0).round())
        .map(Some)
        .ok_or(CoreError::AmountOutOfRange(amount))
}

/// `cents` as an `i64`, or `None` where `as` would saturate.
fn checked_cents(cents: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if cents >= i64::MAX as f64 || cents < i64::MIN as f64 {
        return None;
    }
    Some(cents as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_amount_converts_exactly() {
        assert_eq!(to_minor_units(Some(1500.0)).unwrap(), Some(150_000));
    }

    #[test]
    fn fractional_cents_round_up() {
        assert_eq!(to_minor_units(Some(10.005)).unwrap(), Some(1001));
        assert_eq!(to_minor_units(Some(0.019)).unwrap(), Some(2));
    }

    #[test]
    fn fractional_cents_round_down() {
        assert_eq!(to_minor_units(Some(10.004)).unwrap(), Some(1000));
    }

    #[test]
    fn rounding_is_not_truncation() {
        // 19.99 * 100 is 1998.9999999999998 in binary floating point.
        assert_eq!(to_minor_units(Some(19.99)).unwrap(), Some(1999));
    }

    #[test]
    fn negative_amounts_round_symmetrically() {
        assert_eq!(to_minor_units(Some(-2.5)).unwrap(), Some(-250));
        assert_eq!(to_minor_units(Some(-0.016)).unwrap(), Some(-2));
    }

    #[test]
    fn zero_is_zero_not_none() {
        assert_eq!(to_minor_units(Some(0.0)).unwrap(), Some(0));
    }

    #[test]
    fn missing_amount_is_none() {
        assert_eq!(to_minor_units(None).unwrap(), None);
    }

    #[test]
    fn non_finite_amount_rejected() {
        assert!(to_minor_units(Some(f64::NAN)).is_err());
        assert!(to_minor_units(Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn overflowing_amount_rejected() {
        assert!(matches!(
            to_minor_units(Some(1e300)),
            Err(CoreError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn two_pow_63_cents_rejected_not_saturated() {
        assert_eq!(checked_cents(2f64.powi(63)), None);
        assert_eq!(checked_cents(2f64.powi(62)), Some(1i64 << 62));
        assert_eq!(checked_cents(-(2f64.powi(63))), Some(i64::MIN));
        assert_eq!(checked_cents(-(2f64.powi(64))), None);
    }
}
