// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The flag store: public surface and the mutation engine.
//!
//! Every user-visible change funnels through one engine pass with a fixed
//! phase order:
//!
//! 1. validate the key and operand types;
//! 2. stage the direct change set, dropping structural no-ops;
//! 3. propagate through the computed graph in topological order;
//! 4. append one history step for the consolidated change set;
//! 5. broadcast to subscribers;
//! 6. autosave when plain state changed.
//!
//! Phases 1–4 run while the store's interior is borrowed; the borrow is
//! released before broadcast, so subscriber callbacks may freely re-enter
//! the store. A reentrant mutation is a complete, independent engine pass
//! with its own history step and broadcast.
//!
//! Batch mode replaces phases 4–6 for inner mutations: their change sets
//! merge into one aggregate that commits as a single step and a single
//! bulk broadcast, or rolls back wholesale if the batch thunk fails.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::computed::{
    affected_computed, evaluate, topo_order, would_cycle, ComputeFailure, ComputedFlag,
};
use crate::diag::{DiagnosticSink, TracingDiagnosticSink};
use crate::error::StoreError;
use crate::event::{ChangeEvent, ChangeRecord};
use crate::history::{HistoryLog, HistoryOptions};
use crate::key::{validate_key, EVENT_BATCH, EVENT_CLEAR, EVENT_SET_MANY};
use crate::notify::{invoke_all, NotifyHub, Subscription};
use crate::persist::{decode_snapshot, encode_snapshot, PersistOptions};
use crate::registry::{Entry, Registry};
use crate::value::FlagValue;

/// How a committed change set reaches subscribers.
#[derive(Clone, Copy)]
enum BroadcastMode {
    /// Per key: the key's list first, then the global list.
    PerKey,
    /// Per-key lists fire for every affected key; the global list receives
    /// one synthetic event instead of per-key events.
    Bulk(&'static str),
    /// Only the global list fires, with one synthetic event (`clear`).
    SyntheticOnly(&'static str),
}

/// Aggregate state of an open batch.
struct BatchState {
    plain: Vec<ChangeRecord>,
    plain_pos: FxHashMap<String, usize>,
    computed: Vec<ChangeRecord>,
    computed_pos: FxHashMap<String, usize>,
    snapshot_plain: BTreeMap<String, FlagValue>,
    snapshot_caches: Vec<(String, Option<FlagValue>)>,
}

impl BatchState {
    fn capture(registry: &Registry) -> Self {
        Self {
            plain: Vec::new(),
            plain_pos: FxHashMap::default(),
            computed: Vec::new(),
            computed_pos: FxHashMap::default(),
            snapshot_plain: registry.plain_snapshot(),
            snapshot_caches: registry
                .computed_entries()
                .map(|(key, flag)| (key.clone(), flag.cache.clone()))
                .collect(),
        }
    }
}

struct Inner {
    registry: Registry,
    index: crate::computed::DependencyIndex,
    hub: NotifyHub,
    history: Option<HistoryLog>,
    batch: Option<BatchState>,
    batch_depth: usize,
    persist: Option<PersistOptions>,
    diag: Rc<dyn DiagnosticSink>,
    next_seq: u64,
}

/// An embedded reactive flag store.
///
/// The store is a cheaply clonable handle; clones share one registry.
/// All operations are synchronous and single-threaded (the handle is not
/// `Send`); subscriber callbacks run on the caller's stack and may
/// re-enter the store.
#[derive(Clone)]
pub struct FlagStore {
    inner: Rc<RefCell<Inner>>,
}

impl std::fmt::Debug for FlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FlagStore")
            .field("keys", &inner.registry.keys().len())
            .field("history", &inner.history.is_some())
            .field("persist", &inner.persist.is_some())
            .finish()
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagStore {
    /// Creates an empty store with no history and no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Registry::new(), None, None, None)
    }

    /// Starts a [`StoreBuilder`].
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    fn from_parts(
        registry: Registry,
        history: Option<HistoryOptions>,
        persist: Option<PersistOptions>,
        diag: Option<Rc<dyn DiagnosticSink>>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                registry,
                index: crate::computed::DependencyIndex::default(),
                hub: NotifyHub::default(),
                history: history.map(HistoryLog::new),
                batch: None,
                batch_depth: 0,
                persist,
                diag: diag.unwrap_or_else(|| Rc::new(TracingDiagnosticSink)),
                next_seq: 0,
            })),
        }
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// Current value of `key`; `None` when Absent. Computed keys return
    /// their cached value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<FlagValue> {
        self.inner.borrow().registry.get(key).cloned()
    }

    /// `true` when `key` occupies the registry (plain or computed).
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner.borrow().registry.has(key)
    }

    /// All keys, plain and computed together, in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().registry.keys()
    }

    /// Snapshot of every present value, computed values included.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, FlagValue> {
        self.inner.borrow().registry.all()
    }

    /// Typed read: the boolean at `key`, or `None` on Absent or mismatch.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Typed read: the number at `key`, or `None` on Absent or mismatch.
    #[must_use]
    pub fn get_num(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_num())
    }

    /// Typed read: the string at `key`, or `None` on Absent or mismatch.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| match v {
            FlagValue::Str(s) => Some(s),
            _ => None,
        })
    }

    // ── Writes ─────────────────────────────────────────────────────────

    /// Sets a plain flag to `value`, creating it when Absent.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] for reserved or empty keys;
    /// [`StoreError::ReadOnlyComputed`] when `key` is computed.
    pub fn set(&self, key: &str, value: impl Into<FlagValue>) -> Result<(), StoreError> {
        let value = value.into();
        validate_key(key)?;
        let staged = {
            let inner = self.inner.borrow();
            match inner.registry.entry(key) {
                Some(Entry::Computed(_)) => {
                    return Err(StoreError::ReadOnlyComputed(key.to_owned()))
                }
                Some(Entry::Plain(old)) if *old == value => Vec::new(),
                Some(Entry::Plain(old)) => {
                    vec![ChangeRecord::new(key, Some(old.clone()), Some(value))]
                }
                None => vec![ChangeRecord::new(key, None, Some(value))],
            }
        };
        self.commit_changes(staged, BroadcastMode::PerKey);
        Ok(())
    }

    /// Deletes a plain flag; Absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] for reserved or empty keys;
    /// [`StoreError::ReadOnlyComputed`] when `key` is computed.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let staged = {
            let inner = self.inner.borrow();
            match inner.registry.entry(key) {
                Some(Entry::Computed(_)) => {
                    return Err(StoreError::ReadOnlyComputed(key.to_owned()))
                }
                Some(Entry::Plain(old)) => {
                    vec![ChangeRecord::new(key, Some(old.clone()), None)]
                }
                None => Vec::new(),
            }
        };
        self.commit_changes(staged, BroadcastMode::PerKey);
        Ok(())
    }

    /// Flips a boolean flag and returns the new value. An Absent key is
    /// created as `true`.
    ///
    /// # Errors
    ///
    /// [`StoreError::TypeMismatch`] when the existing value is not a
    /// boolean; [`StoreError::ReadOnlyComputed`] / [`StoreError::InvalidKey`]
    /// as for [`set`](Self::set).
    pub fn toggle(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let (staged, new) = {
            let inner = self.inner.borrow();
            match inner.registry.entry(key) {
                Some(Entry::Computed(_)) => {
                    return Err(StoreError::ReadOnlyComputed(key.to_owned()))
                }
                Some(Entry::Plain(FlagValue::Bool(b))) => {
                    let new = !*b;
                    (
                        vec![ChangeRecord::new(
                            key,
                            Some(FlagValue::Bool(*b)),
                            Some(FlagValue::Bool(new)),
                        )],
                        new,
                    )
                }
                Some(Entry::Plain(other)) => {
                    return Err(StoreError::TypeMismatch {
                        key: key.to_owned(),
                        expected: "bool",
                        found: other.type_name(),
                    })
                }
                None => (
                    vec![ChangeRecord::new(key, None, Some(FlagValue::Bool(true)))],
                    true,
                ),
            }
        };
        self.commit_changes(staged, BroadcastMode::PerKey);
        Ok(new)
    }

    /// Adds 1 to a numeric flag and returns the new value. An Absent key
    /// is created as `1`.
    ///
    /// # Errors
    ///
    /// See [`increment_by`](Self::increment_by).
    pub fn increment(&self, key: &str) -> Result<f64, StoreError> {
        self.increment_by(key, 1.0)
    }

    /// Adds `delta` to a numeric flag and returns the new value. An Absent
    /// key is created as `delta`.
    ///
    /// # Errors
    ///
    /// [`StoreError::TypeMismatch`] when the existing value is not a
    /// number; [`StoreError::ReadOnlyComputed`] / [`StoreError::InvalidKey`]
    /// as for [`set`](Self::set).
    pub fn increment_by(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        validate_key(key)?;
        let (staged, new) = {
            let inner = self.inner.borrow();
            match inner.registry.entry(key) {
                Some(Entry::Computed(_)) => {
                    return Err(StoreError::ReadOnlyComputed(key.to_owned()))
                }
                Some(Entry::Plain(FlagValue::Num(x))) => {
                    let new = x + delta;
                    let rec = ChangeRecord::new(
                        key,
                        Some(FlagValue::Num(*x)),
                        Some(FlagValue::Num(new)),
                    );
                    (if rec.is_noop() { Vec::new() } else { vec![rec] }, new)
                }
                Some(Entry::Plain(other)) => {
                    return Err(StoreError::TypeMismatch {
                        key: key.to_owned(),
                        expected: "number",
                        found: other.type_name(),
                    })
                }
                None => (
                    vec![ChangeRecord::new(key, None, Some(FlagValue::Num(delta)))],
                    delta,
                ),
            }
        };
        self.commit_changes(staged, BroadcastMode::PerKey);
        Ok(new)
    }

    /// Subtracts 1 from a numeric flag; see [`increment`](Self::increment).
    ///
    /// # Errors
    ///
    /// See [`increment_by`](Self::increment_by).
    pub fn decrement(&self, key: &str) -> Result<f64, StoreError> {
        self.increment_by(key, -1.0)
    }

    /// Subtracts `delta` from a numeric flag; an Absent key is created as
    /// `-delta`.
    ///
    /// # Errors
    ///
    /// See [`increment_by`](Self::increment_by).
    pub fn decrement_by(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        self.increment_by(key, -delta)
    }

    /// Sets several flags as one step: one history entry, per-key events
    /// for every affected key, and a single `__setMany__` event on the
    /// global list.
    ///
    /// # Errors
    ///
    /// The first failing inner `set` aborts the whole operation and rolls
    /// the registry back; no events fire and no step is recorded.
    pub fn set_many<K, V, I>(&self, entries: I) -> Result<(), StoreError>
    where
        K: Into<String>,
        V: Into<FlagValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(String, FlagValue)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.run_bulk(EVENT_SET_MANY, move || {
            for (key, value) in entries {
                self.set(&key, value)?;
            }
            Ok(())
        })
    }

    /// Removes every plain flag in one step. Computed definitions survive
    /// and are recomputed against the now-empty plain space. Per-key
    /// subscribers are not notified; the global list receives a single
    /// `__clear__` event.
    pub fn clear(&self) {
        self.clear_prefix(None);
    }

    /// Runs `thunk` in batch mode: inner mutations merge into one
    /// aggregate that commits as a single history step, per-key events for
    /// every affected key, and a single `__batch__` event on the global
    /// list.
    ///
    /// Nested batches are absorbed into the outermost one.
    ///
    /// # Errors
    ///
    /// When the thunk returns `Err`, the aggregate is discarded and the
    /// registry rolls back to its pre-batch snapshot. A panicking thunk
    /// rolls back the same way before the panic resumes.
    pub fn batch<F>(&self, thunk: F) -> Result<(), StoreError>
    where
        F: FnOnce() -> Result<(), StoreError>,
    {
        self.run_bulk(EVENT_BATCH, thunk)
    }

    // ── Computed flags ─────────────────────────────────────────────────

    /// Registers (or redefines) the computed flag `key` over `deps`.
    ///
    /// Dependency order and duplicates are preserved; the function receives
    /// one positional argument per declared dependency, `None` for Absent.
    /// The initial evaluation runs immediately under the usual containment
    /// rule; when it yields a value, that value is broadcast as a change
    /// from Absent and recorded as a history step.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] for reserved or empty keys;
    /// [`StoreError::KeyConflict`] when `key` holds a plain flag;
    /// [`StoreError::CircularDependency`] when the registration would close
    /// a cycle (detected before any state change).
    pub fn compute<F>(&self, key: &str, deps: &[&str], func: F) -> Result<(), StoreError>
    where
        F: Fn(&[Option<FlagValue>]) -> Result<FlagValue, ComputeFailure> + 'static,
    {
        validate_key(key)?;
        let staged = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if matches!(inner.registry.entry(key), Some(Entry::Plain(_))) {
                return Err(StoreError::KeyConflict(key.to_owned()));
            }
            let deps: Vec<String> = deps.iter().map(|d| (*d).to_owned()).collect();
            if would_cycle(&inner.registry, key, &deps) {
                return Err(StoreError::CircularDependency(key.to_owned()));
            }
            let old_cache = match inner.registry.computed(key) {
                Some(previous) => {
                    let old_deps = previous.deps.clone();
                    let cache = previous.cache.clone();
                    inner.index.remove_edges(key, &old_deps);
                    cache
                }
                None => None,
            };
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.index.add_edges(key, &deps);
            inner.registry.insert_computed(
                key,
                ComputedFlag {
                    deps,
                    func: Rc::new(func),
                    cache: old_cache.clone(),
                    seq,
                },
            );
            match evaluate(&inner.registry, key) {
                Some(value) if old_cache.as_ref() != Some(&value) => {
                    vec![ChangeRecord::new(key, old_cache, Some(value))]
                }
                _ => Vec::new(),
            }
        };
        self.commit_changes(staged, BroadcastMode::PerKey);
        Ok(())
    }

    // ── Subscriptions ──────────────────────────────────────────────────

    /// Registers a global subscriber: invoked once per changed key per
    /// mutation, and for the synthetic bulk events.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent<'_>) + 'static) -> Subscription {
        self.inner.borrow_mut().hub.subscribe(Rc::new(callback))
    }

    /// Registers a subscriber for a single key.
    pub fn subscribe_key(
        &self,
        key: &str,
        callback: impl Fn(&ChangeEvent<'_>) + 'static,
    ) -> Subscription {
        self.inner
            .borrow_mut()
            .hub
            .subscribe_key(key, Rc::new(callback))
    }

    /// Active `(global, per-key)` subscriber counts; test introspection.
    pub(crate) fn active_subscriber_counts(&self) -> (usize, usize) {
        self.inner.borrow().hub.active_counts()
    }

    // ── History ────────────────────────────────────────────────────────

    /// Reverts the most recent step; `false` at the origin (or when the
    /// store has no history). Values are restored from the step — computed
    /// flags are not recomputed — and the restoration is broadcast without
    /// appending a new step.
    pub fn undo(&self) -> bool {
        self.replay(ReplayDirection::Back)
    }

    /// Re-applies the step past the cursor; `false` at the head. Same
    /// replay rules as [`undo`](Self::undo).
    pub fn redo(&self) -> bool {
        self.replay(ReplayDirection::Forward)
    }

    /// `true` when a step can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.inner
            .borrow()
            .history
            .as_ref()
            .is_some_and(HistoryLog::can_undo)
    }

    /// `true` when a step can be redone.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.inner
            .borrow()
            .history
            .as_ref()
            .is_some_and(HistoryLog::can_redo)
    }

    /// Number of retained history steps (both sides of the cursor).
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner
            .borrow()
            .history
            .as_ref()
            .map_or(0, HistoryLog::len)
    }

    /// Discards all history without touching current registry state. Does
    /// not trigger autosave.
    pub fn clear_history(&self) {
        if let Some(history) = self.inner.borrow_mut().history.as_mut() {
            history.clear();
        }
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Serializes the plain registry through the configured backend.
    /// No-op when the store has no persistence.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] when encoding or the backend write fails.
    pub fn save(&self) -> Result<(), StoreError> {
        let inner = self.inner.borrow();
        let Some(persist) = inner.persist.as_ref() else {
            return Ok(());
        };
        let blob = encode_snapshot(&inner.registry.plain_snapshot())?;
        persist.backend.write(&persist.blob_key, &blob)?;
        Ok(())
    }

    // ── Engine internals ───────────────────────────────────────────────

    /// Removes plain flags (all of them, or a namespace subtree) as one
    /// `__clear__` step.
    pub(crate) fn clear_prefix(&self, prefix: Option<&str>) {
        let staged = {
            let inner = self.inner.borrow();
            inner
                .registry
                .plain_keys(prefix)
                .into_iter()
                .map(|key| {
                    let old = inner.registry.get(&key).cloned();
                    ChangeRecord::new(key, old, None)
                })
                .collect::<Vec<_>>()
        };
        self.commit_changes(staged, BroadcastMode::SyntheticOnly(EVENT_CLEAR));
    }

    /// Phases 2–6 for one engine pass over already-validated staged
    /// records. Empty change sets (after no-op dropping and propagation)
    /// produce no step, no events, and no autosave.
    fn commit_changes(&self, staged: Vec<ChangeRecord>, mode: BroadcastMode) {
        if staged.is_empty() {
            return;
        }
        let committed = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;

            // Apply the direct changes.
            for rec in &staged {
                if inner.registry.is_computed(&rec.key) {
                    inner.registry.set_computed_cache(&rec.key, rec.new.clone());
                } else {
                    inner.registry.restore_plain(&rec.key, rec.new.clone());
                }
            }

            // Propagate through the computed graph.
            let affected =
                affected_computed(&inner.index, staged.iter().map(|r| r.key.as_str()));
            let mut full = staged;
            for key in topo_order(&inner.registry, &affected) {
                let Some(new) = evaluate(&inner.registry, &key) else {
                    continue; // contained failure: cache retained, no event
                };
                let old = inner.registry.computed(&key).and_then(|f| f.cache.clone());
                if old.as_ref() == Some(&new) {
                    continue;
                }
                inner.registry.set_computed_cache(&key, Some(new.clone()));
                full.push(ChangeRecord::new(key, old, Some(new)));
            }

            // Inside a batch: merge into the aggregate and stop.
            if inner.batch.is_some() {
                Self::merge_into_batch(inner, full);
                None
            } else {
                let plain_changed = full.iter().any(|r| !inner.registry.is_computed(&r.key));
                if let Some(history) = inner.history.as_mut() {
                    history.push(full.clone());
                }
                Some((full, plain_changed))
            }
        };
        if let Some((records, plain_changed)) = committed {
            self.broadcast(&records, mode);
            if plain_changed {
                self.autosave();
            }
        }
    }

    fn merge_into_batch(inner: &mut Inner, records: Vec<ChangeRecord>) {
        let Some(batch) = inner.batch.as_mut() else {
            return;
        };
        for rec in records {
            let computed = inner.registry.is_computed(&rec.key);
            let (list, pos) = if computed {
                (&mut batch.computed, &mut batch.computed_pos)
            } else {
                (&mut batch.plain, &mut batch.plain_pos)
            };
            match pos.get(&rec.key) {
                // Last write wins; the first-seen old value is kept.
                Some(&i) => list[i].new = rec.new,
                None => {
                    pos.insert(rec.key.clone(), list.len());
                    list.push(rec);
                }
            }
        }
    }

    fn run_bulk<F>(&self, synthetic: &'static str, thunk: F) -> Result<(), StoreError>
    where
        F: FnOnce() -> Result<(), StoreError>,
    {
        self.enter_batch();
        match catch_unwind(AssertUnwindSafe(thunk)) {
            Err(payload) => {
                self.abort_batch();
                resume_unwind(payload);
            }
            Ok(Err(err)) => {
                self.abort_batch();
                Err(err)
            }
            Ok(Ok(())) => {
                self.commit_batch(synthetic);
                Ok(())
            }
        }
    }

    fn enter_batch(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.batch_depth += 1;
        if inner.batch_depth == 1 {
            inner.batch = Some(BatchState::capture(&inner.registry));
        }
    }

    /// Discards the aggregate and restores the pre-batch snapshot (plain
    /// entries and computed caches). Only the outermost batch restores;
    /// nested failures bubble up to it.
    fn abort_batch(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.batch_depth -= 1;
        if inner.batch_depth > 0 {
            return;
        }
        let Some(batch) = inner.batch.take() else {
            return;
        };
        for key in inner.registry.plain_keys(None) {
            if !batch.snapshot_plain.contains_key(&key) {
                inner.registry.remove_plain(&key);
            }
        }
        for (key, value) in batch.snapshot_plain {
            inner.registry.insert_plain(&key, value);
        }
        for (key, cache) in batch.snapshot_caches {
            inner.registry.set_computed_cache(&key, cache);
        }
    }

    fn commit_batch(&self, synthetic: &'static str) {
        let committed = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.batch_depth -= 1;
            let batch = if inner.batch_depth == 0 {
                inner.batch.take()
            } else {
                None
            };
            match batch {
                None => None,
                Some(batch) => {
                    // Plain keys in first-write order, computed keys in
                    // topological order of the final graph.
                    let mut records: Vec<ChangeRecord> =
                        batch.plain.into_iter().filter(|r| !r.is_noop()).collect();
                    let affected: FxHashSet<String> =
                        batch.computed_pos.keys().cloned().collect();
                    let mut by_key: FxHashMap<String, ChangeRecord> = batch
                        .computed
                        .into_iter()
                        .map(|r| (r.key.clone(), r))
                        .collect();
                    for key in topo_order(&inner.registry, &affected) {
                        if let Some(rec) = by_key.remove(&key) {
                            if !rec.is_noop() {
                                records.push(rec);
                            }
                        }
                    }
                    let plain_changed =
                        records.iter().any(|r| !inner.registry.is_computed(&r.key));
                    if !records.is_empty() {
                        if let Some(history) = inner.history.as_mut() {
                            history.push(records.clone());
                        }
                    }
                    Some((records, plain_changed))
                }
            }
        };
        if let Some((records, plain_changed)) = committed {
            if records.is_empty() {
                return;
            }
            self.broadcast(&records, BroadcastMode::Bulk(synthetic));
            if plain_changed {
                self.autosave();
            }
        }
    }

    fn replay(&self, direction: ReplayDirection) -> bool {
        let (events, plain_changed) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Some(history) = inner.history.as_mut() else {
                return false;
            };
            let step = match direction {
                ReplayDirection::Back => history.undo(),
                ReplayDirection::Forward => history.redo(),
            };
            let Some(step) = step else {
                return false;
            };
            let mut events = Vec::with_capacity(step.len());
            let mut plain_changed = false;
            for rec in &step {
                let target = match direction {
                    ReplayDirection::Back => rec.old.clone(),
                    ReplayDirection::Forward => rec.new.clone(),
                };
                // Values come from the step; the computed graph is not
                // re-invoked during replay.
                if inner.registry.is_computed(&rec.key) {
                    inner.registry.set_computed_cache(&rec.key, target);
                } else {
                    inner.registry.restore_plain(&rec.key, target);
                    plain_changed = true;
                }
                events.push(match direction {
                    ReplayDirection::Back => rec.inverted(),
                    ReplayDirection::Forward => rec.clone(),
                });
            }
            (events, plain_changed)
        };
        self.broadcast(&events, BroadcastMode::PerKey);
        if plain_changed {
            self.autosave();
        }
        true
    }

    /// Phase 5. Runs with the interior borrow released; each list is
    /// snapshotted at the moment delivery begins for it.
    fn broadcast(&self, records: &[ChangeRecord], mode: BroadcastMode) {
        match mode {
            BroadcastMode::PerKey => {
                for rec in records {
                    self.deliver_per_key(rec);
                    self.deliver_global(&ChangeEvent::from_record(rec));
                }
            }
            BroadcastMode::Bulk(synthetic) => {
                for rec in records {
                    self.deliver_per_key(rec);
                }
                self.deliver_global(&ChangeEvent::synthetic(synthetic));
            }
            BroadcastMode::SyntheticOnly(synthetic) => {
                if !records.is_empty() {
                    self.deliver_global(&ChangeEvent::synthetic(synthetic));
                }
            }
        }
    }

    fn deliver_per_key(&self, record: &ChangeRecord) {
        let (snapshot, diag) = {
            let inner = self.inner.borrow();
            (inner.hub.snapshot_key(&record.key), Rc::clone(&inner.diag))
        };
        invoke_all(&snapshot, &ChangeEvent::from_record(record), &*diag);
    }

    fn deliver_global(&self, event: &ChangeEvent<'_>) {
        let (snapshot, diag) = {
            let inner = self.inner.borrow();
            (inner.hub.snapshot_global(), Rc::clone(&inner.diag))
        };
        invoke_all(&snapshot, event, &*diag);
    }

    /// Phase 6. Best-effort: failures go to the diagnostic sink, never to
    /// the caller — the mutation has already committed and broadcast.
    fn autosave(&self) {
        let inner = self.inner.borrow();
        let Some(persist) = inner.persist.as_ref() else {
            return;
        };
        if !persist.auto_save {
            return;
        }
        match encode_snapshot(&inner.registry.plain_snapshot()) {
            Ok(blob) => {
                if let Err(err) = persist.backend.write(&persist.blob_key, &blob) {
                    inner.diag.autosave_failure(&err);
                }
            }
            Err(err) => inner.diag.autosave_failure(&err),
        }
    }
}

#[derive(Clone, Copy)]
enum ReplayDirection {
    Back,
    Forward,
}

/// Fluent builder for [`FlagStore`].
///
/// ```rust
/// use vexil_core::{FlagStore, HistoryOptions, MemoryBackend, PersistOptions};
///
/// let store = FlagStore::builder()
///     .flag("retries", 3)
///     .history(HistoryOptions::default())
///     .persist(PersistOptions::new(MemoryBackend::new()))
///     .build()
///     .unwrap();
/// assert_eq!(store.get_num("retries"), Some(3.0));
/// ```
#[derive(Default)]
pub struct StoreBuilder {
    initial: Vec<(String, FlagValue)>,
    history: Option<HistoryOptions>,
    persist: Option<PersistOptions>,
    diag: Option<Rc<dyn DiagnosticSink>>,
}

impl StoreBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds initial plain flags.
    #[must_use]
    pub fn initial<K, V, I>(mut self, entries: I) -> Self
    where
        K: Into<String>,
        V: Into<FlagValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.initial
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds a single initial plain flag.
    #[must_use]
    pub fn flag(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.initial.push((key.into(), value.into()));
        self
    }

    /// Enables undo/redo history.
    #[must_use]
    pub fn history(mut self, options: HistoryOptions) -> Self {
        self.history = Some(options);
        self
    }

    /// Enables persistence. At build time an existing blob is loaded and
    /// merged over the initial flags (loaded values win).
    #[must_use]
    pub fn persist(mut self, options: PersistOptions) -> Self {
        self.persist = Some(options);
        self
    }

    /// Overrides the diagnostic sink (default: tracing at warn level).
    #[must_use]
    pub fn diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diag = Some(Rc::new(sink));
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] when an initial key is reserved or
    /// empty; [`StoreError::Backend`] when the persisted blob exists but
    /// cannot be read or decoded.
    pub fn build(self) -> Result<FlagStore, StoreError> {
        for (key, _) in &self.initial {
            validate_key(key)?;
        }
        let mut registry = Registry::new();
        for (key, value) in self.initial {
            registry.insert_plain(&key, value);
        }
        if let Some(persist) = &self.persist {
            if let Some(blob) = persist.backend.read(&persist.blob_key)? {
                for (key, value) in decode_snapshot(&blob)? {
                    registry.insert_plain(&key, value);
                }
            }
        }
        Ok(FlagStore::from_parts(
            registry,
            self.history,
            self.persist,
            self.diag,
        ))
    }
}

impl std::fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("initial", &self.initial.len())
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}
