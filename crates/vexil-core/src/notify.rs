// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The notification pipeline: subscriber lists and contained delivery.
//!
//! Two kinds of subscription exist: global (every change) and per-key.
//! Within each list, delivery order is registration order. Delivery
//! iterates over a snapshot taken when delivery begins for that list, so
//! subscribers added during delivery are not invoked for the current event;
//! subscribers cancelled during delivery are skipped even if the snapshot
//! still holds them.
//!
//! A panicking subscriber is contained: the panic payload is reported to
//! the diagnostic sink and delivery proceeds with the next subscriber.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::diag::{panic_detail, DiagnosticSink};
use crate::event::ChangeEvent;

/// A subscriber callback.
pub(crate) type Callback = Rc<dyn Fn(&ChangeEvent<'_>)>;

/// One registered subscriber. The `active` cell is the deregistration
/// state; snapshots re-check it at invocation time.
pub(crate) struct SubscriberEntry {
    active: Cell<bool>,
    callback: Callback,
}

/// Deregistration handle returned by `subscribe` / `subscribe_key`.
///
/// `cancel` is idempotent: the second and later calls are no-ops. Dropping
/// the handle does *not* deregister the subscriber.
pub struct Subscription {
    entry: Rc<SubscriberEntry>,
}

impl Subscription {
    /// Deregisters the subscriber. Safe to call any number of times.
    pub fn cancel(&self) {
        self.entry.active.set(false);
    }

    /// `true` until the first `cancel` call.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.entry.active.get()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.entry.active.get())
            .finish()
    }
}

/// Append-only (during delivery) list of subscribers.
#[derive(Default)]
struct SubscriberList {
    entries: Vec<Rc<SubscriberEntry>>,
}

impl SubscriberList {
    fn push(&mut self, callback: Callback) -> Subscription {
        // Compact cancelled entries outside of any delivery snapshot.
        self.entries.retain(|e| e.active.get());
        let entry = Rc::new(SubscriberEntry {
            active: Cell::new(true),
            callback,
        });
        self.entries.push(Rc::clone(&entry));
        Subscription { entry }
    }

    fn snapshot(&self) -> Vec<Rc<SubscriberEntry>> {
        self.entries.clone()
    }

    fn active_len(&self) -> usize {
        self.entries.iter().filter(|e| e.active.get()).count()
    }
}

/// Global and per-key subscriber registries.
#[derive(Default)]
pub(crate) struct NotifyHub {
    global: SubscriberList,
    per_key: BTreeMap<String, SubscriberList>,
}

impl NotifyHub {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> Subscription {
        self.global.push(callback)
    }

    pub(crate) fn subscribe_key(&mut self, key: &str, callback: Callback) -> Subscription {
        self.per_key.entry(key.to_owned()).or_default().push(callback)
    }

    /// Snapshot of the global list, taken as delivery begins.
    pub(crate) fn snapshot_global(&self) -> Vec<Rc<SubscriberEntry>> {
        self.global.snapshot()
    }

    /// Snapshot of a per-key list; empty when nobody subscribed to `key`.
    pub(crate) fn snapshot_key(&self, key: &str) -> Vec<Rc<SubscriberEntry>> {
        self.per_key.get(key).map_or_else(Vec::new, SubscriberList::snapshot)
    }

    /// `(global, per-key)` active subscriber counts, for tests.
    pub(crate) fn active_counts(&self) -> (usize, usize) {
        let per_key = self.per_key.values().map(SubscriberList::active_len).sum();
        (self.global.active_len(), per_key)
    }
}

/// Invokes every still-active entry in a snapshot, containing panics.
pub(crate) fn invoke_all(
    entries: &[Rc<SubscriberEntry>],
    event: &ChangeEvent<'_>,
    diag: &dyn DiagnosticSink,
) {
    for entry in entries {
        if !entry.active.get() {
            continue;
        }
        let callback = Rc::clone(&entry.callback);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
            diag.subscriber_failure(event.key, &panic_detail(&*payload));
        }
    }
}
