//! Parsing of Kubernetes-style resource quantities

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity '{0}'")]
    Invalid(String),
    #[error("quantity '{0}' is negative")]
    Negative(String),
    #[error("quantity '{0}' is too large")]
    Overflow(String),
}

const MEMORY_SUFFIXES: [(&str, u64); 8] = [
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("k", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
];

fn number(raw: &str, original: &str) -> Result<Decimal, QuantityError> {
    let value = Decimal::from_str(raw).map_err(|_| QuantityError::Invalid(original.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(QuantityError::Negative(original.to_string()));
    }
    Ok(value)
}

fn whole(value: Decimal, original: &str) -> Result<u64, QuantityError> {
    value
        .ceil()
        .to_u64()
        .ok_or_else(|| QuantityError::Overflow(original.to_string()))
}

/// CPU in millicores: `250m`, `0.5` or `2` (cores)
pub fn parse_cpu(input: &str) -> Result<u64, QuantityError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(QuantityError::Empty);
    }
    match input.strip_suffix('m') {
        Some(millis) => whole(number(millis, input)?, input),
        None => {
            let cores = number(input, input)?;
            let millis = cores
                .checked_mul(Decimal::from(1000))
                .ok_or_else(|| QuantityError::Overflow(input.to_string()))?;
            whole(millis, input)
        }
    }
}

/// Memory in bytes: `512Mi`, `1.5Gi`, `1G` or a plain byte count
pub fn parse_memory(input: &str) -> Result<u64, QuantityError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(QuantityError::Empty);
    }
    for (suffix, multiplier) in MEMORY_SUFFIXES {
        if let Some(amount) = input.strip_suffix(suffix) {
            let bytes = number(amount, input)?
                .checked_mul(Decimal::from(multiplier))
                .ok_or_else(|| QuantityError::Overflow(input.to_string()))?;
            return whole(bytes, input);
        }
    }
    whole(number(input, input)?, input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert_eq!(parse_cpu("250m"), Ok(250));
        assert_eq!(parse_cpu("0.5"), Ok(500));
        assert_eq!(parse_cpu("2"), Ok(2000));
        assert_eq!(parse_cpu(""), Err(QuantityError::Empty));
        assert!(matches!(parse_cpu("-1"), Err(QuantityError::Negative(_))));
        assert!(matches!(parse_cpu("lots"), Err(QuantityError::Invalid(_))));
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory("512Mi"), Ok(512 * 1024 * 1024));
        assert_eq!(parse_memory("1.5Gi"), Ok(3 * (1 << 29)));
        assert_eq!(parse_memory("1G"), Ok(1_000_000_000));
        assert_eq!(parse_memory("4096"), Ok(4096));
        assert!(matches!(parse_memory("12Qi"), Err(QuantityError::Invalid(_))));
    }
}
