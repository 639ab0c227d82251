// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Key validation and the reserved synthetic event names.
//!
//! Keys wrapped in double underscores (`__…__`) are reserved for the
//! synthetic events the store emits on bulk operations. They are rejected
//! everywhere a caller can name a key, so a user flag can never shadow a
//! synthetic event.

use crate::error::StoreError;

/// Synthetic event key broadcast once per committed batch.
pub const EVENT_BATCH: &str = "__batch__";
/// Synthetic event key broadcast once per `set_many`.
pub const EVENT_SET_MANY: &str = "__setMany__";
/// Synthetic event key broadcast once per `clear`.
pub const EVENT_CLEAR: &str = "__clear__";

/// Returns `true` when `key` is in the reserved `__…__` namespace.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    key.len() >= 4 && key.starts_with("__") && key.ends_with("__")
}

/// Validates a user-supplied key: non-empty and not reserved.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for the empty string and for keys in
/// the reserved `__…__` namespace.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || is_reserved(key) {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_needs_both_ends() {
        assert!(is_reserved("__clear__"));
        assert!(is_reserved("____"));
        assert!(!is_reserved("__leading"));
        assert!(!is_reserved("trailing__"));
        assert!(!is_reserved("middle__mark"));
        assert!(!is_reserved("__"));
    }

    #[test]
    fn validation_rejects_empty_and_reserved() {
        assert!(validate_key("").is_err());
        assert!(validate_key("__batch__").is_err());
        assert!(validate_key("feature.dark_mode").is_ok());
        assert!(validate_key("__x").is_ok());
    }
}
