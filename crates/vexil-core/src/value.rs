// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The scalar value universe for flags.
//!
//! A flag holds exactly one of three scalar shapes: boolean, number, or
//! string. There are no nested containers. Equality is structural, and
//! numeric equality follows IEEE-754 (`NaN != NaN`), which is why
//! [`FlagValue`] is `PartialEq` but deliberately not `Eq`.
//!
//! The serde encoding is untagged: values round-trip through JSON as the
//! plain scalars `true`, `3.5`, `"s"`. This keeps persisted snapshots
//! readable and diff-friendly.

use serde::{Deserialize, Serialize};

/// A tagged scalar flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric flag (IEEE-754 double).
    Num(f64),
    /// String flag.
    Str(String),
}

impl FlagValue {
    /// Returns the human-readable name of this value's tag.
    ///
    /// Used in error messages (`TypeMismatch`) and the CLI.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Num(_) => "number",
            Self::Str(_) => "string",
        }
    }

    /// Returns the boolean payload when this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the numeric payload when this is a `Num`.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the string payload when this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness of a value: `Bool(false)`, `Num(0)`, and `Str("")` are
    /// falsy; everything else is truthy. Absent keys are falsy at the
    /// boundary (see [`truthy`]).
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Num(x) => *x != 0.0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    /// Numeric coercion helper for compute functions.
    ///
    /// Absent and non-numeric inputs coerce to `0.0`. The kernel never
    /// applies this itself: compute functions receive Absent dependencies
    /// as `None` and opt into coercion explicitly.
    #[must_use]
    pub fn num_or_zero(value: Option<&Self>) -> f64 {
        value.and_then(Self::as_num).unwrap_or(0.0)
    }
}

/// Truthiness of an optional value; Absent (`None`) is falsy.
#[must_use]
pub fn truthy(value: Option<&FlagValue>) -> bool {
    value.is_some_and(FlagValue::is_truthy)
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for FlagValue {
    fn from(x: f64) -> Self {
        Self::Num(x)
    }
}

impl From<i32> for FlagValue {
    fn from(x: i32) -> Self {
        Self::Num(f64::from(x))
    }
}

impl From<&str> for FlagValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for FlagValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_is_ieee() {
        assert_eq!(FlagValue::Num(1.5), FlagValue::Num(1.5));
        assert_ne!(FlagValue::Num(f64::NAN), FlagValue::Num(f64::NAN));
        assert_eq!(FlagValue::Num(0.0), FlagValue::Num(-0.0));
        assert_ne!(FlagValue::Bool(true), FlagValue::Num(1.0));
    }

    #[test]
    fn truthiness_table() {
        assert!(!FlagValue::Bool(false).is_truthy());
        assert!(!FlagValue::Num(0.0).is_truthy());
        assert!(!FlagValue::Str(String::new()).is_truthy());
        assert!(FlagValue::Bool(true).is_truthy());
        assert!(FlagValue::Num(-2.0).is_truthy());
        assert!(FlagValue::Str("x".into()).is_truthy());
        // NaN is not in the falsy set.
        assert!(FlagValue::Num(f64::NAN).is_truthy());
        assert!(!truthy(None));
    }

    #[test]
    fn untagged_json_round_trip() {
        for v in [
            FlagValue::Bool(true),
            FlagValue::Num(2.5),
            FlagValue::Str("hello".into()),
        ] {
            let blob = serde_json::to_string(&v).expect("encode");
            let back: FlagValue = serde_json::from_str(&blob).expect("decode");
            assert_eq!(back, v);
        }
        assert_eq!(serde_json::to_string(&FlagValue::Bool(true)).unwrap(), "true");
    }

    #[test]
    fn num_or_zero_coerces_absent() {
        assert_eq!(FlagValue::num_or_zero(None), 0.0);
        assert_eq!(FlagValue::num_or_zero(Some(&FlagValue::Num(4.0))), 4.0);
        assert_eq!(FlagValue::num_or_zero(Some(&FlagValue::Str("x".into()))), 0.0);
    }
}
