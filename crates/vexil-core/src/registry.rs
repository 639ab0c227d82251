// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The flag registry: one ordered map from key to entry.
//!
//! A key holds either a plain value or a computed definition, never both —
//! the single-map representation makes that invariant structural rather
//! than checked. `BTreeMap` keeps every observable enumeration
//! deterministic.
//!
//! The registry exposes read accessors publicly through the store; all
//! mutators are `pub(crate)` and called only from the mutation engine, so
//! every user-visible change funnels through one code path.

use std::collections::BTreeMap;

use crate::computed::ComputedFlag;
use crate::value::FlagValue;

/// A registry occupant: plain scalar or computed definition.
#[derive(Clone)]
pub(crate) enum Entry {
    /// Directly written scalar value.
    Plain(FlagValue),
    /// Derived flag: dependency list, function, cached output.
    Computed(ComputedFlag),
}

/// Ordered key → entry mapping.
#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Current value of a key: the plain value, or a computed flag's cached
    /// value. `None` means Absent — the key is unknown, or the computed
    /// flag has never evaluated successfully.
    pub(crate) fn get(&self, key: &str) -> Option<&FlagValue> {
        match self.entries.get(key)? {
            Entry::Plain(value) => Some(value),
            Entry::Computed(flag) => flag.cache.as_ref(),
        }
    }

    /// `true` when the key occupies the registry (plain or computed).
    pub(crate) fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn is_computed(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(Entry::Computed(_)))
    }

    /// All keys, plain and computed together, in sorted order.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Snapshot of every present value, computed caches included.
    ///
    /// Computed flags whose cache is Absent are omitted: they have no
    /// value to report.
    pub(crate) fn all(&self) -> BTreeMap<String, FlagValue> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                Entry::Plain(value) => Some((key.clone(), value.clone())),
                Entry::Computed(flag) => flag.cache.clone().map(|v| (key.clone(), v)),
            })
            .collect()
    }

    /// Snapshot of plain entries only — the persisted shape.
    pub(crate) fn plain_snapshot(&self) -> BTreeMap<String, FlagValue> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                Entry::Plain(value) => Some((key.clone(), value.clone())),
                Entry::Computed(_) => None,
            })
            .collect()
    }

    /// Plain keys, optionally restricted to a prefix (namespace subtree).
    pub(crate) fn plain_keys(&self, prefix: Option<&str>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, entry)| {
                matches!(entry, Entry::Plain(_))
                    && prefix.is_none_or(|p| key.starts_with(p))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn computed(&self, key: &str) -> Option<&ComputedFlag> {
        match self.entries.get(key) {
            Some(Entry::Computed(flag)) => Some(flag),
            _ => None,
        }
    }

    /// Iterates computed entries in sorted key order.
    pub(crate) fn computed_entries(&self) -> impl Iterator<Item = (&String, &ComputedFlag)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            Entry::Computed(flag) => Some((key, flag)),
            Entry::Plain(_) => None,
        })
    }

    // ── Mutators (engine only) ─────────────────────────────────────────

    pub(crate) fn insert_plain(&mut self, key: &str, value: FlagValue) {
        self.entries.insert(key.to_owned(), Entry::Plain(value));
    }

    pub(crate) fn remove_plain(&mut self, key: &str) -> Option<FlagValue> {
        match self.entries.get(key) {
            Some(Entry::Plain(_)) => match self.entries.remove(key) {
                Some(Entry::Plain(value)) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn insert_computed(&mut self, key: &str, flag: ComputedFlag) {
        self.entries.insert(key.to_owned(), Entry::Computed(flag));
    }

    pub(crate) fn set_computed_cache(&mut self, key: &str, cache: Option<FlagValue>) {
        if let Some(Entry::Computed(flag)) = self.entries.get_mut(key) {
            flag.cache = cache;
        }
    }

    /// Restores a plain key to `value` (`None` removes it). Used by
    /// undo/redo replay and batch rollback.
    pub(crate) fn restore_plain(&mut self, key: &str, value: Option<FlagValue>) {
        match value {
            Some(v) => self.insert_plain(key, v),
            None => {
                self.remove_plain(key);
            }
        }
    }
}
