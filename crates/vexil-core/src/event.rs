// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change records and subscriber events.
//!
//! A [`ChangeRecord`] is the canonical `(key, old, new)` tuple produced by
//! one mutation. The ordered list of records from a single engine pass is
//! the *change set*; it is what the history log stores and what the
//! notification pipeline walks. [`ChangeEvent`] is the borrowed view of one
//! record handed to subscriber callbacks.

use crate::value::FlagValue;

/// One `(key, old, new)` tuple of a change set.
///
/// `None` on either side means Absent: a record with `old == None` is a
/// creation, `new == None` a deletion. The engine guarantees `old != new`
/// under structural equality for every record it emits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Affected key (plain or computed).
    pub key: String,
    /// Value before the mutation; `None` when the key was Absent.
    pub old: Option<FlagValue>,
    /// Value after the mutation; `None` when the key is now Absent.
    pub new: Option<FlagValue>,
}

impl ChangeRecord {
    /// Builds a record; plain construction, no invariant checks.
    #[must_use]
    pub fn new(key: impl Into<String>, old: Option<FlagValue>, new: Option<FlagValue>) -> Self {
        Self {
            key: key.into(),
            old,
            new,
        }
    }

    /// Returns the record with `old` and `new` swapped (the undo view).
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            key: self.key.clone(),
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }

    /// Returns `true` when the record is a no-op under structural equality.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

/// Borrowed view of one change delivered to a subscriber callback.
///
/// Synthetic events (`__batch__`, `__setMany__`, `__clear__`) carry
/// `old == None` and `new == None`; they signal a bulk operation rather
/// than a single key's transition.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent<'a> {
    /// Affected key, or a reserved synthetic event name.
    pub key: &'a str,
    /// Value after the change; `None` when Absent (or synthetic).
    pub new: Option<&'a FlagValue>,
    /// Value before the change; `None` when Absent (or synthetic).
    pub old: Option<&'a FlagValue>,
}

impl<'a> ChangeEvent<'a> {
    /// Borrows a [`ChangeRecord`] as an event.
    #[must_use]
    pub fn from_record(record: &'a ChangeRecord) -> Self {
        Self {
            key: &record.key,
            new: record.new.as_ref(),
            old: record.old.as_ref(),
        }
    }

    /// Builds a synthetic bulk event for a reserved key.
    #[must_use]
    pub fn synthetic(key: &'a str) -> Self {
        Self {
            key,
            new: None,
            old: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inversion_swaps_sides() {
        let rec = ChangeRecord::new("k", None, Some(FlagValue::Num(1.0)));
        let inv = rec.inverted();
        assert_eq!(inv.old, Some(FlagValue::Num(1.0)));
        assert_eq!(inv.new, None);
        assert_eq!(inv.inverted(), rec);
    }

    #[test]
    fn noop_detection_uses_structural_equality() {
        let same = ChangeRecord::new("k", Some(FlagValue::Bool(true)), Some(FlagValue::Bool(true)));
        assert!(same.is_noop());
        let nan = ChangeRecord::new(
            "k",
            Some(FlagValue::Num(f64::NAN)),
            Some(FlagValue::Num(f64::NAN)),
        );
        // NaN != NaN, so a NaN rewrite is a real change.
        assert!(!nan.is_noop());
    }
}
