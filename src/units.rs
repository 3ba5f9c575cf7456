//! Base ↔ display amount conversion.
//!
//! Amounts are handled as digit strings and scaled by moving the decimal
//! point, so precision is unbounded and nothing ever passes through a float.

use crate::error::ConversionError;

/// Fractional digits kept when formatting for display.
pub const DISPLAY_PRECISION: usize = 6;

/// Canonical form of a base-unit integer string: digits only, no leading zeros.
pub fn normalize_base_amount(amount: &str) -> Result<String, ConversionError> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConversionError::NotAnAmount(amount.into()));
    }
    let trimmed = amount.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".into()
    } else {
        trimmed.into()
    })
}

pub fn is_positive_base_amount(amount: &str) -> bool {
    normalize_base_amount(amount).is_ok_and(|a| a != "0")
}

/// `"1234567", 6` → `"1.234567"`; `"1000000000000", 6` → `"1,000,000"`.
///
/// Fractional digits beyond [`DISPLAY_PRECISION`] are truncated and trailing
/// zeros trimmed.
pub fn to_display(base_amount: &str, exponent: u32) -> Result<String, ConversionError> {
    let digits = normalize_base_amount(base_amount)?;
    let exponent = exponent as usize;

    let padded = if digits.len() <= exponent {
        format!("{}{}", "0".repeat(exponent + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (integer, fraction) = padded.split_at(padded.len() - exponent);

    let fraction: String = fraction.chars().take(DISPLAY_PRECISION).collect();
    let fraction = fraction.trim_end_matches('0');
    let integer = group_thousands(integer);

    Ok(if fraction.is_empty() {
        integer
    } else {
        format!("{integer}.{fraction}")
    })
}

/// `"1.5", 6` → `"1500000"`. Digits past `exponent` are floored away.
/// Thousands separators are accepted.
pub fn to_base(display_amount: &str, exponent: u32) -> Result<String, ConversionError> {
    let cleaned: String = display_amount
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let (integer, fraction) = cleaned.split_once('.').unwrap_or((&cleaned, ""));

    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (integer.is_empty() && fraction.is_empty()) || !digits_only(integer) || !digits_only(fraction)
    {
        return Err(ConversionError::NotAnAmount(display_amount.into()));
    }

    let scaled_fraction: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(exponent as usize)
        .collect();

    normalize_base_amount(&format!("{integer}{scaled_fraction}"))
}

fn group_thousands(integer: &str) -> String {
    let len = integer.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (ix, digit) in integer.chars().enumerate() {
        if ix != 0 && (len - ix) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
