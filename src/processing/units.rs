use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::error::RecordError;

pub const ETHER_DECIMALS: u32 = 18;

/// Parse a provider integer string (decimal digits only)
pub fn parse_integer(field: &'static str, raw: &str) -> Result<BigDecimal, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::InvalidNumber {
            field,
            value: raw.to_string(),
        });
    }

    BigDecimal::from_str(trimmed).map_err(|_| RecordError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

/// Divide by 10^decimals without any loss of precision
pub fn scale_down(value: BigDecimal, decimals: u32) -> BigDecimal {
    let (digits, scale) = value.into_bigint_and_exponent();
    BigDecimal::new(digits, scale + decimals as i64).normalized()
}

pub fn wei_to_ether(wei: BigDecimal) -> BigDecimal {
    scale_down(wei, ETHER_DECIMALS)
}

/// Render without exponent notation or trailing zeros, e.g. `0.000021`
pub fn plain_decimal(value: &BigDecimal) -> String {
    value.normalized().to_plain_string()
}
