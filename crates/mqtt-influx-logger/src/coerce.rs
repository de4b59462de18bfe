// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Raw payload to typed field value conversion.

use crate::influx::FieldValue;
use crate::registry::ValueType;
use thiserror::Error;

/// Payload could not be converted to the declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceError {
    #[error("invalid {value_type} value: {raw:?}")]
    InvalidValue { value_type: ValueType, raw: String },
}

/// How boolean payloads are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolMode {
    /// `false` iff the payload is exactly `"0"`, `true` for anything else.
    ///
    /// Existing deployments rely on this, so it stays the default.
    #[default]
    Loose,
    /// Only `true/false/1/0/on/off/yes/no` (case-insensitive) are accepted.
    Strict,
}

/// Converts raw payloads into [`FieldValue`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCoercer {
    bool_mode: BoolMode,
}

impl ValueCoercer {
    pub fn new(bool_mode: BoolMode) -> Self {
        Self { bool_mode }
    }

    pub fn bool_mode(&self) -> BoolMode {
        self.bool_mode
    }

    /// Convert `raw` according to `value_type`.
    pub fn coerce(&self, raw: &[u8], value_type: ValueType) -> Result<FieldValue, CoerceError> {
        let invalid = || CoerceError::InvalidValue {
            value_type,
            raw: String::from_utf8_lossy(raw).into_owned(),
        };
        let text = std::str::from_utf8(raw).map_err(|_| invalid())?;

        match value_type {
            ValueType::String => Ok(FieldValue::String(text.to_string())),
            ValueType::Int => text
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| invalid()),
            ValueType::Bool => match self.bool_mode {
                BoolMode::Loose => Ok(FieldValue::Boolean(text != "0")),
                BoolMode::Strict => parse_strict_bool(text)
                    .map(FieldValue::Boolean)
                    .ok_or_else(invalid),
            },
            ValueType::Float => match text.trim().parse::<f64>() {
                // Line protocol has no representation for NaN or infinities
                Ok(v) if v.is_finite() => Ok(FieldValue::Float(v)),
                _ => Err(invalid()),
            },
        }
    }
}

fn parse_strict_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    const TRUE: [&str; 4] = ["true", "1", "on", "yes"];
    const FALSE: [&str; 4] = ["false", "0", "off", "no"];

    if TRUE.iter().any(|t| text.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSE.iter().any(|f| text.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose() -> ValueCoercer {
        ValueCoercer::default()
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(
            loose().coerce(b"42", ValueType::Int),
            Ok(FieldValue::Integer(42))
        );
        assert_eq!(
            loose().coerce(b" -7\n", ValueType::Int),
            Ok(FieldValue::Integer(-7))
        );
    }

    #[test]
    fn test_coerce_int_invalid() {
        match loose().coerce(b"abc", ValueType::Int) {
            Err(CoerceError::InvalidValue { value_type, raw }) => {
                assert_eq!(value_type, ValueType::Int);
                assert_eq!(raw, "abc");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
        assert!(loose().coerce(b"4.2", ValueType::Int).is_err());
    }

    #[test]
    fn test_coerce_float() {
        match loose().coerce(b"3.5", ValueType::Float) {
            Ok(FieldValue::Float(v)) => assert!((v - 3.5).abs() < f64::EPSILON),
            other => panic!("expected Float, got {:?}", other),
        }
        match loose().coerce(b"21", ValueType::Float) {
            Ok(FieldValue::Float(v)) => assert!((v - 21.0).abs() < f64::EPSILON),
            other => panic!("expected Float, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_float_rejects_garbage_and_non_finite() {
        assert!(loose().coerce(b"warm", ValueType::Float).is_err());
        assert!(loose().coerce(b"NaN", ValueType::Float).is_err());
        assert!(loose().coerce(b"inf", ValueType::Float).is_err());
        assert!(loose().coerce(b"", ValueType::Float).is_err());
    }

    #[test]
    fn test_coerce_bool_loose() {
        assert_eq!(
            loose().coerce(b"0", ValueType::Bool),
            Ok(FieldValue::Boolean(false))
        );
        assert_eq!(
            loose().coerce(b"1", ValueType::Bool),
            Ok(FieldValue::Boolean(true))
        );
        // Anything that is not exactly "0" is true
        assert_eq!(
            loose().coerce(b"false", ValueType::Bool),
            Ok(FieldValue::Boolean(true))
        );
        assert_eq!(
            loose().coerce(b" 0", ValueType::Bool),
            Ok(FieldValue::Boolean(true))
        );
    }

    #[test]
    fn test_coerce_bool_strict() {
        let strict = ValueCoercer::new(BoolMode::Strict);
        assert_eq!(
            strict.coerce(b"OFF", ValueType::Bool),
            Ok(FieldValue::Boolean(false))
        );
        assert_eq!(
            strict.coerce(b"True", ValueType::Bool),
            Ok(FieldValue::Boolean(true))
        );
        assert!(strict.coerce(b"maybe", ValueType::Bool).is_err());
    }

    #[test]
    fn test_coerce_string_passthrough() {
        assert_eq!(
            loose().coerce(b" open ", ValueType::String),
            Ok(FieldValue::String(" open ".to_string()))
        );
    }

    #[test]
    fn test_coerce_rejects_invalid_utf8() {
        assert!(loose().coerce(&[0xff, 0xfe], ValueType::String).is_err());
        assert!(loose().coerce(&[0xff], ValueType::Bool).is_err());
    }
}
