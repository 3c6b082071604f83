//! Exact conversion between human-readable decimals and chain base units.
//!
//! Value amounts never pass through floating point: parsing and
//! formatting are fixed-point over `U256`, so a purchase of "0.01"
//! is exactly 10^16 wei and formats back to "0.01".

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;
use thiserror::Error;

/// Decimals of the chain's native currency (wei-style 18).
pub const NATIVE_DECIMALS: u8 = 18;

/// Errors from parsing a user-supplied amount.
#[derive(Debug, Error)]
pub enum AmountError {
    /// Not a decimal number, or more fractional digits than base units allow.
    #[error("invalid amount: {0}")]
    Invalid(String),

    /// Parsed fine but is zero or negative.
    #[error("amount must be greater than zero")]
    NotPositive,
}

/// Parse a decimal string into base units.
///
/// Rejects empty input, non-numeric input, zero, negatives, and any
/// fractional part finer than the base unit.
pub fn parse_native(amount: &str) -> Result<U256, AmountError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Invalid("empty input".to_string()));
    }

    let parsed = parse_units(trimmed, NATIVE_DECIMALS)
        .map_err(|e| AmountError::Invalid(e.to_string()))?;
    if parsed.is_negative() {
        return Err(AmountError::NotPositive);
    }

    let wei = parsed.get_absolute();
    if wei.is_zero() {
        return Err(AmountError::NotPositive);
    }
    Ok(wei)
}

/// Format base units as a decimal string with trailing zeros trimmed.
pub fn format_native(wei: U256) -> String {
    match format_units(wei, NATIVE_DECIMALS) {
        Ok(s) => trim_fraction(&s),
        // format_units only fails on an invalid unit; 18 is valid, but
        // fall back to raw base units rather than panic.
        Err(_) => wei.to_string(),
    }
}

fn trim_fraction(s: &str) -> String {
    match s.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                int.to_string()
            } else {
                format!("{}.{}", int, frac)
            }
        }
        None => s.to_string(),
    }
}
