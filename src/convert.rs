//! Hex and JSON value conversion helpers

use alloy_primitives::U256;
use serde_json::Value;

use crate::error::TransformError;

/// Lowercase a hex string without touching the payload
pub fn normalize_hex(value: &str) -> String {
    value.to_ascii_lowercase()
}

/// Strip a leading `0x`/`0X` prefix if present
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a `0x`-prefixed (or bare) hex quantity into a U256
pub fn hex_to_u256(value: &str) -> Result<U256, TransformError> {
    let stripped = strip_hex_prefix(value.trim());
    if stripped.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(stripped, 16)
        .map_err(|e| TransformError::transform(format!("invalid hex quantity '{value}': {e}")))
}

/// Parse a hex quantity into a u64, erroring if it does not fit
pub fn hex_to_u64(value: &str) -> Result<u64, TransformError> {
    let parsed = hex_to_u256(value)?;
    parsed
        .try_into()
        .map_err(|_| TransformError::transform(format!("hex quantity '{value}' exceeds u64")))
}

/// Render a U256 as a JSON value: a number when it fits 64 bits, otherwise
/// its decimal string since columns that wide are stringly typed anyway
pub fn u256_to_value(value: U256) -> Value {
    match u64::try_from(value) {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(value.to_string()),
    }
}

/// Convert a possibly-hex value to an integer value. Numbers pass through
/// untouched, `0x` strings are parsed as hex, anything else is an error.
pub fn hex_to_int(value: &Value) -> Result<Value, TransformError> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
                Ok(u256_to_value(hex_to_u256(trimmed)?))
            } else if trimmed.chars().all(|c| c.is_ascii_digit())
                || (trimmed.starts_with('-')
                    && trimmed.len() > 1
                    && trimmed[1..].chars().all(|c| c.is_ascii_digit()))
            {
                // already a decimal rendering of a wide integer
                match trimmed.parse::<i64>() {
                    Ok(n) => Ok(Value::from(n)),
                    Err(_) => Ok(Value::String(trimmed.to_string())),
                }
            } else {
                Err(TransformError::transform(format!(
                    "cannot convert '{s}' to an integer"
                )))
            }
        }
        other => Err(TransformError::transform(format!(
            "cannot convert {other} to an integer"
        ))),
    }
}

/// Convert a possibly-hex value to a float
pub fn hex_to_float(value: &Value) -> Result<Value, TransformError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => Ok(Value::from(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => {
            let trimmed = s.trim();
            let as_float = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
                u256_to_f64(hex_to_u256(trimmed)?)
            } else {
                trimmed.parse::<f64>().map_err(|e| {
                    TransformError::transform(format!("cannot convert '{s}' to a float: {e}"))
                })?
            };
            Ok(Value::from(as_float))
        }
        other => Err(TransformError::transform(format!(
            "cannot convert {other} to a float"
        ))),
    }
}

fn u256_to_f64(value: U256) -> f64 {
    // lossy by design, bound comparisons only need magnitude
    value.to_string().parse::<f64>().unwrap_or(f64::INFINITY)
}

/// Numeric view of a row value for bound comparisons
pub fn value_to_f64(value: &Value) -> Result<f64, TransformError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| TransformError::transform(format!("non-finite number {n}"))),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
                Ok(u256_to_f64(hex_to_u256(trimmed)?))
            } else {
                trimmed.parse::<f64>().map_err(|e| {
                    TransformError::transform(format!("cannot compare '{s}' numerically: {e}"))
                })
            }
        }
        other => Err(TransformError::transform(format!(
            "cannot compare {other} numerically"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hex_to_u256() {
        assert_eq!(hex_to_u256("0x10").unwrap(), U256::from(16));
        assert_eq!(hex_to_u256("10").unwrap(), U256::from(16));
        assert_eq!(hex_to_u256("0x").unwrap(), U256::ZERO);
        assert!(hex_to_u256("0xzz").is_err());
    }

    #[test]
    fn test_hex_to_int_passthrough_and_hex() {
        assert_eq!(hex_to_int(&json!(42)).unwrap(), json!(42));
        assert_eq!(hex_to_int(&json!("0x2a")).unwrap(), json!(42));
        assert!(hex_to_int(&json!(true)).is_err());
    }

    #[test]
    fn test_hex_to_int_wide_values_stay_strings() {
        // 2^128 does not fit in a u64, the decimal rendering is kept
        let wide = hex_to_int(&json!("0x100000000000000000000000000000000")).unwrap();
        assert_eq!(wide, json!("340282366920938463463374607431768211456"));
    }

    #[test]
    fn test_hex_to_float() {
        assert_eq!(hex_to_float(&json!("0x10")).unwrap(), json!(16.0));
        assert_eq!(hex_to_float(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_value_to_f64() {
        assert_eq!(value_to_f64(&json!(2)).unwrap(), 2.0);
        assert_eq!(value_to_f64(&json!("0x2")).unwrap(), 2.0);
        assert_eq!(value_to_f64(&json!("2.5")).unwrap(), 2.5);
        assert!(value_to_f64(&json!([1])).is_err());
    }
}
