//! Fixed-point conversion between decimal amounts and 18-decimal base units.
//!
//! Base units are carried as unsigned integer strings at the API boundary and
//! as [`BigUint`] internally. No floating point is involved anywhere.
//!
//! # Base-unit classification
//!
//! [`is_base_unit`] is a heuristic: a digit string is treated as base units
//! only when it is `"0"` or strictly greater than `100000`. A small integer
//! such as `"42"` is therefore read as a decimal amount, never as 42 base
//! units. Callers that already hold base units below that threshold must use
//! the [`BigUint`] paths (for example [`format_base_units`]) instead.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use std::cmp::Ordering;
use thiserror::Error;

/// Number of implied decimals in a base-unit amount.
pub const BASE_DECIMALS: u32 = 18;

/// Largest fractional scale accepted by [`divide`].
pub const MAX_DIVIDE_SCALE: u32 = 100;

/// Values at or below this threshold (other than `"0"`) are not base units.
const BASE_UNIT_THRESHOLD: u32 = 100_000;

/// Errors raised by unit conversion and arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("invalid decimal amount: {0}")]
    InvalidFormat(String),

    #[error("invalid base-unit amount: {0}")]
    NotBaseUnit(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("scale {0} exceeds the maximum of {MAX_DIVIDE_SCALE}")]
    ScaleTooLarge(u32),
}

pub type Result<T> = std::result::Result<T, UnitError>;

/// 10^18 as a big integer.
pub fn base_unit() -> BigUint {
    BigUint::from(10u32).pow(BASE_DECIMALS)
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn parse_digits(value: &str) -> Option<BigUint> {
    if !is_digits(value) {
        return None;
    }
    BigUint::parse_bytes(value.as_bytes(), 10)
}

/// Check whether `value` is classified as a base-unit amount.
pub fn is_base_unit(value: &str) -> bool {
    if value == "0" {
        return true;
    }
    match parse_digits(value) {
        Some(n) => n > BigUint::from(BASE_UNIT_THRESHOLD),
        None => false,
    }
}

/// Parse a base-unit string, enforcing the classification heuristic.
pub fn parse_base_unit(value: &str) -> Result<BigUint> {
    if !is_base_unit(value) {
        return Err(UnitError::NotBaseUnit(value.to_string()));
    }
    parse_digits(value).ok_or_else(|| UnitError::NotBaseUnit(value.to_string()))
}

/// Convert a decimal amount (`^\d+(\.\d+)?$`) into base units.
///
/// Fractional digits beyond the 18th are truncated.
pub fn decimal_to_base_units(amount: &str) -> Result<BigUint> {
    let invalid = || UnitError::InvalidFormat(amount.to_string());

    let (int_part, frac_part) = match amount.split_once('.') {
        Some((int_part, frac_part)) => {
            if !is_digits(frac_part) {
                return Err(invalid());
            }
            (int_part, frac_part)
        }
        None => (amount, ""),
    };
    let whole = parse_digits(int_part).ok_or_else(invalid)?;

    let decimals = BASE_DECIMALS as usize;
    let truncated = &frac_part[..frac_part.len().min(decimals)];
    let padded = format!("{truncated:0<decimals$}");
    let fraction = parse_digits(&padded).ok_or_else(invalid)?;

    Ok(whole * base_unit() + fraction)
}

/// Convert a decimal amount into a base-unit string.
pub fn to_base_unit(amount: &str) -> Result<String> {
    decimal_to_base_units(amount).map(|n| n.to_string())
}

/// Render base units as a decimal string, trimming trailing zeros.
pub fn format_base_units(value: &BigUint) -> String {
    format_scaled(value, BASE_DECIMALS as usize)
}

/// Render `value / 10^scale` with trailing fractional zeros trimmed.
fn format_scaled(value: &BigUint, scale: usize) -> String {
    let divisor = BigUint::from(10u32).pow(scale as u32);
    let whole = value / &divisor;
    let remainder = value % &divisor;
    if remainder.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:0>scale$}", remainder.to_string());
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Convert a base-unit string back to a decimal string.
pub fn from_base_unit(value: &str) -> Result<String> {
    let n = parse_base_unit(value)?;
    Ok(format_base_units(&n))
}

/// Accept either a decimal amount or a base-unit string, returning base units.
pub fn normalize_to_base_unit(value: &str) -> Result<BigUint> {
    if is_base_unit(value) {
        parse_base_unit(value)
    } else {
        decimal_to_base_units(value)
    }
}

/// Add two base-unit amounts.
pub fn add(a: &str, b: &str) -> Result<String> {
    let (a, b) = (parse_base_unit(a)?, parse_base_unit(b)?);
    Ok((a + b).to_string())
}

/// Subtract `b` from `a`. The result may be negative.
pub fn subtract(a: &str, b: &str) -> Result<String> {
    let (a, b) = (parse_base_unit(a)?, parse_base_unit(b)?);
    Ok((BigInt::from(a) - BigInt::from(b)).to_string())
}

/// Compare two base-unit amounts.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let (a, b) = (parse_base_unit(a)?, parse_base_unit(b)?);
    Ok(a.cmp(&b))
}

/// Multiply two amounts (decimal or base units), returning base units.
///
/// Both operands are scaled by 10^18, so the product is re-scaled once.
pub fn multiply(x: &str, y: &str) -> Result<String> {
    let x = normalize_to_base_unit(x)?;
    let y = normalize_to_base_unit(y)?;
    Ok(((x * y) / base_unit()).to_string())
}

/// Divide two base-unit amounts into a decimal string with at most `scale`
/// fractional digits (truncated, trailing zeros trimmed).
///
/// `scale` is capped at [`MAX_DIVIDE_SCALE`].
pub fn divide(a: &str, b: &str, scale: u32) -> Result<String> {
    if scale > MAX_DIVIDE_SCALE {
        return Err(UnitError::ScaleTooLarge(scale));
    }
    let (a, b) = (parse_base_unit(a)?, parse_base_unit(b)?);
    if b.is_zero() {
        return Err(UnitError::DivisionByZero);
    }
    let scaled = (a * BigUint::from(10u32).pow(scale)) / b;
    Ok(format_scaled(&scaled, scale as usize))
}

/// [`divide`] at the default 18-digit scale.
pub fn divide_default(a: &str, b: &str) -> Result<String> {
    divide(a, b, BASE_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base_unit() {
        assert_eq!(to_base_unit("1").unwrap(), "1000000000000000000");
        assert_eq!(to_base_unit("1.5").unwrap(), "1500000000000000000");
        assert_eq!(to_base_unit("0.25").unwrap(), "250000000000000000");
        assert_eq!(to_base_unit("0").unwrap(), "0");
        assert_eq!(to_base_unit("0.000000000000000001").unwrap(), "1");
    }

    #[test]
    fn test_to_base_unit_truncates_beyond_18_digits() {
        assert_eq!(to_base_unit("0.0000000000000000019").unwrap(), "1");
        assert_eq!(
            to_base_unit("1.9999999999999999999").unwrap(),
            "1999999999999999999"
        );
    }

    #[test]
    fn test_to_base_unit_rejects_bad_format() {
        for bad in ["", "abc", "-1", "1.", ".5", "1.2.3", "1e18", " 1", "1,5"] {
            assert_eq!(
                to_base_unit(bad),
                Err(UnitError::InvalidFormat(bad.to_string())),
                "input {bad:?}"
            );
        }
    }

    #[test]
    fn test_from_base_unit() {
        assert_eq!(from_base_unit("1000000000000000000").unwrap(), "1");
        assert_eq!(from_base_unit("1500000000000000000").unwrap(), "1.5");
        assert_eq!(from_base_unit("100000000000000000000").unwrap(), "100");
        assert_eq!(from_base_unit("0").unwrap(), "0");
        assert_eq!(from_base_unit("100001").unwrap(), "0.000000000000100001");
    }

    #[test]
    fn test_from_base_unit_rejects_non_base_units() {
        assert!(matches!(from_base_unit("42"), Err(UnitError::NotBaseUnit(_))));
        assert!(matches!(from_base_unit("1.5"), Err(UnitError::NotBaseUnit(_))));
    }

    #[test]
    fn test_is_base_unit_boundary() {
        assert!(is_base_unit("0"));
        assert!(!is_base_unit("1"));
        assert!(!is_base_unit("100000"));
        assert!(is_base_unit("100001"));
        assert!(!is_base_unit("00"));
        assert!(!is_base_unit(""));
        assert!(!is_base_unit("1.0"));
        assert!(!is_base_unit("-100001"));
        assert!(is_base_unit("99999999999999999999999999999999999999"));
    }

    #[test]
    fn test_round_trip() {
        for amount in ["1", "1.5", "0.25", "10", "123456.000000000000000001", "0.000001"] {
            let base = to_base_unit(amount).unwrap();
            assert_eq!(from_base_unit(&base).unwrap(), amount);
        }
    }

    #[test]
    fn test_add_subtract_compare() {
        let one = "1000000000000000000";
        let half = "500000000000000000";
        assert_eq!(add(one, half).unwrap(), "1500000000000000000");
        assert_eq!(subtract(one, half).unwrap(), "500000000000000000");
        assert_eq!(subtract(half, one).unwrap(), "-500000000000000000");
        assert_eq!(compare(one, half).unwrap(), Ordering::Greater);
        assert_eq!(compare(half, half).unwrap(), Ordering::Equal);
        assert_eq!(compare("0", half).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_arithmetic_rejects_non_base_units() {
        assert!(matches!(add("5", "1000000"), Err(UnitError::NotBaseUnit(_))));
        assert!(matches!(subtract("1000000", "1.5"), Err(UnitError::NotBaseUnit(_))));
        assert!(matches!(compare("100000", "0"), Err(UnitError::NotBaseUnit(_))));
    }

    #[test]
    fn test_multiply_mixed_inputs() {
        // 1.5 * 2 = 3 units
        assert_eq!(multiply("1.5", "2").unwrap(), "3000000000000000000");
        assert_eq!(
            multiply("1500000000000000000", "2000000000000000000").unwrap(),
            "3000000000000000000"
        );
        assert_eq!(multiply("0", "2").unwrap(), "0");
    }

    #[test]
    fn test_divide() {
        let three = "3000000000000000000";
        let two = "2000000000000000000";
        assert_eq!(divide_default(three, two).unwrap(), "1.5");
        assert_eq!(divide(two, three, 4).unwrap(), "0.6666");
        assert_eq!(divide(two, two, 18).unwrap(), "1");
        assert_eq!(divide("0", two, 18).unwrap(), "0");
        assert_eq!(divide(three, "0", 18), Err(UnitError::DivisionByZero));
    }

    #[test]
    fn test_divide_scale_is_capped() {
        let one = "1000000000000000000";
        let three = "3000000000000000000";
        let at_cap = divide(one, three, MAX_DIVIDE_SCALE).unwrap();
        assert_eq!(at_cap.len(), 2 + MAX_DIVIDE_SCALE as usize);
        assert_eq!(
            divide(one, three, MAX_DIVIDE_SCALE + 1),
            Err(UnitError::ScaleTooLarge(MAX_DIVIDE_SCALE + 1))
        );
        assert_eq!(
            divide(one, three, 4_000_000_000),
            Err(UnitError::ScaleTooLarge(4_000_000_000))
        );
    }

    #[test]
    fn test_format_base_units_small_values() {
        assert_eq!(format_base_units(&BigUint::from(1u32)), "0.000000000000000001");
        assert_eq!(format_base_units(&BigUint::zero()), "0");
    }
}
