// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The computed-flag graph: dependency tracking and recomputation.
//!
//! Computed flags form a DAG over string keys. Dependents are indexed by
//! key, not by pointer, so no cyclic object graphs exist at the
//! implementation level even though the domain speaks of "graphs".
//!
//! Invariants enforced here:
//! - The graph is acyclic at all times; a registration that would close a
//!   cycle is rejected before any state changes.
//! - Recomputation visits the affected subgraph in a stable topological
//!   order, ties broken by registration sequence.
//! - A failing compute function (an `Err` return *or* a panic) retains the
//!   previous cached value and produces no change record.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::registry::Registry;
use crate::value::FlagValue;

/// Marker returned by a compute function to signal a contained failure.
///
/// The failure is swallowed: the flag keeps its previous cached value (or
/// stays Absent if it has never evaluated successfully) and no event is
/// emitted. Panicking inside the function is contained the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeFailure;

/// A computed flag's function.
///
/// Arguments are positioned per the declared dependency list; an Absent
/// dependency is passed as `None`. The function must be pure and must not
/// call back into the store (a reentrant call is contained as a failed
/// evaluation).
pub type ComputeFn = Rc<dyn Fn(&[Option<FlagValue>]) -> Result<FlagValue, ComputeFailure>>;

/// Registry entry for a computed flag.
#[derive(Clone)]
pub(crate) struct ComputedFlag {
    /// Declared dependency keys, in order, duplicates preserved.
    pub(crate) deps: Vec<String>,
    /// The compute function.
    pub(crate) func: ComputeFn,
    /// Last successful output; `None` until the first success.
    pub(crate) cache: Option<FlagValue>,
    /// Registration sequence number; breaks topological ties.
    pub(crate) seq: u64,
}

/// Reverse-dependents index: dependency key → computed keys that name it.
///
/// Kept in lockstep with the registry's computed entries by the engine.
#[derive(Default)]
pub(crate) struct DependencyIndex {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyIndex {
    pub(crate) fn add_edges(&mut self, key: &str, deps: &[String]) {
        for dep in deps {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(key.to_owned());
        }
    }

    pub(crate) fn remove_edges(&mut self, key: &str, deps: &[String]) {
        for dep in deps {
            if let Some(set) = self.dependents.get_mut(dep) {
                set.remove(key);
                if set.is_empty() {
                    self.dependents.remove(dep);
                }
            }
        }
    }

    fn dependents_of(&self, key: &str) -> impl Iterator<Item = &String> {
        self.dependents.get(key).into_iter().flatten()
    }
}

/// Returns `true` when registering `key` with `deps` would close a cycle.
///
/// Runs against the *prospective* graph: `key`'s outgoing edges are taken
/// to be `deps` (replacing any current definition), every other computed
/// flag keeps its edges. The walk never descends through `key`, so a
/// redefinition cannot be tripped up by its own old edges.
pub(crate) fn would_cycle(registry: &Registry, key: &str, deps: &[String]) -> bool {
    let mut stack: Vec<&str> = Vec::new();
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    for dep in deps {
        if dep.as_str() == key {
            return true;
        }
        if visited.insert(dep.as_str()) {
            stack.push(dep.as_str());
        }
    }
    while let Some(current) = stack.pop() {
        let Some(flag) = registry.computed(current) else {
            continue;
        };
        for dep in &flag.deps {
            if dep.as_str() == key {
                return true;
            }
            if visited.insert(dep.as_str()) {
                stack.push(dep.as_str());
            }
        }
    }
    false
}

/// Collects every computed key whose transitive dependency set intersects
/// `seeds` (the directly changed keys of the current mutation).
pub(crate) fn affected_computed<'a>(
    index: &DependencyIndex,
    seeds: impl Iterator<Item = &'a str>,
) -> FxHashSet<String> {
    let mut affected: FxHashSet<String> = FxHashSet::default();
    let mut frontier: Vec<String> = Vec::new();
    for seed in seeds {
        frontier.push(seed.to_owned());
    }
    while let Some(current) = frontier.pop() {
        for dependent in index.dependents_of(&current) {
            if affected.insert(dependent.clone()) {
                frontier.push(dependent.clone());
            }
        }
    }
    affected
}

/// Orders `affected` computed keys topologically (dependencies first),
/// breaking ties by registration sequence.
///
/// The affected set is acyclic by construction, so the selection loop
/// always makes progress.
pub(crate) fn topo_order(registry: &Registry, affected: &FxHashSet<String>) -> Vec<String> {
    let mut remaining: Vec<(u64, String)> = affected
        .iter()
        .filter_map(|key| registry.computed(key).map(|flag| (flag.seq, key.clone())))
        .collect();
    remaining.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let mut ordered: Vec<String> = Vec::with_capacity(remaining.len());
    let mut emitted: FxHashSet<String> = FxHashSet::default();
    while !remaining.is_empty() {
        let mut picked = None;
        for (i, (_, key)) in remaining.iter().enumerate() {
            let ready = registry.computed(key).is_none_or(|flag| {
                flag.deps
                    .iter()
                    .all(|dep| !affected.contains(dep) || emitted.contains(dep))
            });
            if ready {
                picked = Some(i);
                break;
            }
        }
        // Acyclicity guarantees a ready key exists; fall back to the first
        // remaining entry so a corrupted graph cannot hang the engine.
        let i = picked.unwrap_or(0);
        let (_, key) = remaining.remove(i);
        emitted.insert(key.clone());
        ordered.push(key);
    }
    ordered
}

/// Evaluates `key`'s compute function against the current registry.
///
/// Returns `None` on contained failure (an `Err` return or a panic), in
/// which case the caller keeps the previous cache.
pub(crate) fn evaluate(registry: &Registry, key: &str) -> Option<FlagValue> {
    let flag = registry.computed(key)?;
    let args: Vec<Option<FlagValue>> = flag
        .deps
        .iter()
        .map(|dep| registry.get(dep).cloned())
        .collect();
    let func = Rc::clone(&flag.func);
    match catch_unwind(AssertUnwindSafe(move || func(&args))) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(ComputeFailure)) | Err(_) => None,
    }
}
