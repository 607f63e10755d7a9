//! Numeric-unit normalization for benchmark report values.

use thiserror::Error;

/// Scale base for byte counts (IEC binary units).
pub const BASE_BYTES: f64 = 1024.0;

/// Scale base for bit rates (SI decimal units).
pub const BASE_BITS: f64 = 1000.0;

/// Error for a magnitude field that is not a decimal number.
///
/// Callers treat this as fatal: it means the benchmark output grammar no
/// longer matches what the parser expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("could not parse value '{0}' as a floating-point number")]
    InvalidNumericLiteral(String),
}

/// Scale a decimal literal by `base^n` for its unit suffix, truncating
/// toward zero.
///
/// Suffixes k/m/g/t (case-insensitive) map to exponents 1-4; anything
/// else, including the empty suffix, leaves the value unscaled.
pub fn scaled_value(literal: &str, suffix: &str, base: f64) -> Result<i64, UnitError> {
    let value: f64 = literal
        .parse()
        .map_err(|_| UnitError::InvalidNumericLiteral(literal.to_string()))?;

    let exponent = match suffix.to_ascii_lowercase().as_str() {
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        _ => 0,
    };

    Ok((value * base.powi(exponent)) as i64)
}
