// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Namespace facade: a prefixed view over a root store.
//!
//! A namespace rewrites every key argument to `<prefix>.<key>` before it
//! reaches the root store, scopes `keys`/`all`/`clear` to that subtree,
//! and strips the prefix from events before they reach the namespace's
//! subscribers. No state lives here: the facade is a prefix plus a handle.
//!
//! Caller-supplied keys are validated *before* prefixing, so a reserved
//! segment cannot be smuggled in through a prefix.

use std::collections::BTreeMap;

use crate::computed::ComputeFailure;
use crate::error::StoreError;
use crate::event::ChangeEvent;
use crate::key::validate_key;
use crate::notify::Subscription;
use crate::store::FlagStore;
use crate::value::FlagValue;

/// A prefixed, store-like view of a [`FlagStore`] subtree.
#[derive(Debug, Clone)]
pub struct Namespace {
    store: FlagStore,
    /// Full prefix including the trailing separator, e.g. `"app."`.
    prefix: String,
}

impl FlagStore {
    /// Returns a namespaced view that prefixes every key with
    /// `<prefix>.`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] when the prefix is empty or reserved.
    pub fn namespace(&self, prefix: &str) -> Result<Namespace, StoreError> {
        validate_key(prefix)?;
        Ok(Namespace {
            store: self.clone(),
            prefix: format!("{prefix}."),
        })
    }
}

impl Namespace {
    /// The root store this view wraps.
    #[must_use]
    pub fn root(&self) -> &FlagStore {
        &self.store
    }

    /// The full prefix applied to keys, including the trailing `.`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        Ok(format!("{}{key}", self.prefix))
    }

    /// Nested namespace; prefixes compose (`a` then `b` yields `a.b.`).
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] when the segment is empty or reserved.
    pub fn namespace(&self, prefix: &str) -> Result<Self, StoreError> {
        validate_key(prefix)?;
        Ok(Self {
            store: self.store.clone(),
            prefix: format!("{}{prefix}.", self.prefix),
        })
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// Value of the namespaced key; `None` when Absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<FlagValue> {
        self.store.get(&format!("{}{key}", self.prefix))
    }

    /// `true` when the namespaced key exists.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.store.has(&format!("{}{key}", self.prefix))
    }

    /// Typed read; see [`FlagStore::get_bool`].
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Typed read; see [`FlagStore::get_num`].
    #[must_use]
    pub fn get_num(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_num())
    }

    /// Keys in this subtree, prefix stripped, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(self.prefix.as_str()).map(str::to_owned))
            .collect()
    }

    /// Values in this subtree, prefix stripped.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, FlagValue> {
        self.store
            .all()
            .into_iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(self.prefix.as_str())
                    .map(|stripped| (stripped.to_owned(), v))
            })
            .collect()
    }

    // ── Writes ─────────────────────────────────────────────────────────

    /// Sets a flag in this namespace; see [`FlagStore::set`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::set`]; the unprefixed key is validated first.
    pub fn set(&self, key: &str, value: impl Into<FlagValue>) -> Result<(), StoreError> {
        self.store.set(&self.full_key(key)?, value)
    }

    /// Deletes a flag in this namespace; see [`FlagStore::delete`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::delete`].
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(&self.full_key(key)?)
    }

    /// Toggles a boolean flag; see [`FlagStore::toggle`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::toggle`].
    pub fn toggle(&self, key: &str) -> Result<bool, StoreError> {
        self.store.toggle(&self.full_key(key)?)
    }

    /// Adds 1 to a numeric flag; see [`FlagStore::increment`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::increment_by`].
    pub fn increment(&self, key: &str) -> Result<f64, StoreError> {
        self.store.increment_by(&self.full_key(key)?, 1.0)
    }

    /// Adds `delta` to a numeric flag; see [`FlagStore::increment_by`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::increment_by`].
    pub fn increment_by(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        self.store.increment_by(&self.full_key(key)?, delta)
    }

    /// Subtracts 1 from a numeric flag; see [`FlagStore::decrement`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::increment_by`].
    pub fn decrement(&self, key: &str) -> Result<f64, StoreError> {
        self.store.increment_by(&self.full_key(key)?, -1.0)
    }

    /// Subtracts `delta` from a numeric flag.
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::increment_by`].
    pub fn decrement_by(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        self.store.increment_by(&self.full_key(key)?, -delta)
    }

    /// Sets several flags in this namespace as one step; see
    /// [`FlagStore::set_many`].
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::set_many`].
    pub fn set_many<K, V, I>(&self, entries: I) -> Result<(), StoreError>
    where
        K: Into<String>,
        V: Into<FlagValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut prefixed: Vec<(String, FlagValue)> = Vec::new();
        for (key, value) in entries {
            prefixed.push((self.full_key(&key.into())?, value.into()));
        }
        self.store.set_many(prefixed)
    }

    /// Removes every plain flag in this subtree as one `__clear__` step.
    /// Flags outside the namespace are untouched.
    pub fn clear(&self) {
        self.store.clear_prefix(Some(&self.prefix));
    }

    /// Runs `thunk` in batch mode on the root store; see
    /// [`FlagStore::batch`]. Batching is store-global: mutations through
    /// any view merge into the same aggregate.
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::batch`].
    pub fn batch<F>(&self, thunk: F) -> Result<(), StoreError>
    where
        F: FnOnce() -> Result<(), StoreError>,
    {
        self.store.batch(thunk)
    }

    /// Registers a computed flag in this namespace. Dependency keys are
    /// namespaced too.
    ///
    /// # Errors
    ///
    /// As for [`FlagStore::compute`].
    pub fn compute<F>(&self, key: &str, deps: &[&str], func: F) -> Result<(), StoreError>
    where
        F: Fn(&[Option<FlagValue>]) -> Result<FlagValue, ComputeFailure> + 'static,
    {
        let full = self.full_key(key)?;
        let mut full_deps = Vec::with_capacity(deps.len());
        for dep in deps {
            full_deps.push(self.full_key(dep)?);
        }
        let dep_refs: Vec<&str> = full_deps.iter().map(String::as_str).collect();
        self.store.compute(&full, &dep_refs, func)
    }

    // ── Subscriptions ──────────────────────────────────────────────────

    /// Registers a subscriber scoped to this subtree: it fires only for
    /// keys under the prefix and sees them stripped. Synthetic bulk events
    /// never match the prefix, so scoped subscribers do not observe them.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent<'_>) + 'static) -> Subscription {
        let prefix = self.prefix.clone();
        self.store.subscribe(move |event| {
            if let Some(stripped) = event.key.strip_prefix(prefix.as_str()) {
                callback(&ChangeEvent {
                    key: stripped,
                    new: event.new,
                    old: event.old,
                });
            }
        })
    }

    /// Registers a subscriber for one namespaced key, delivered with the
    /// prefix stripped.
    pub fn subscribe_key(
        &self,
        key: &str,
        callback: impl Fn(&ChangeEvent<'_>) + 'static,
    ) -> Subscription {
        let prefix = self.prefix.clone();
        self.store
            .subscribe_key(&format!("{}{key}", self.prefix), move |event| {
                let stripped = event.key.strip_prefix(prefix.as_str()).unwrap_or(event.key);
                callback(&ChangeEvent {
                    key: stripped,
                    new: event.new,
                    old: event.old,
                });
            })
    }
}
