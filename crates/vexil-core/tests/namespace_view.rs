// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Namespace transparency: a view's reads, writes, and subscriptions are
//! exactly the root's, modulo the prefix.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::cell::RefCell;
use std::rc::Rc;

use vexil_core::{FlagStore, FlagValue, HistoryOptions};

#[test]
fn view_reads_equal_root_reads_of_the_prefixed_key() {
    let store = FlagStore::new();
    let ns = store.namespace("app").unwrap();
    store.set("app.x", 7).unwrap();
    assert_eq!(ns.get("x"), store.get("app.x"));
    assert_eq!(ns.get_num("x"), Some(7.0));
    ns.set("y", true).unwrap();
    assert_eq!(store.get_bool("app.y"), Some(true));
}

#[test]
fn counters_and_toggles_operate_on_prefixed_keys() {
    let store = FlagStore::new();
    let ns = store.namespace("app").unwrap();
    assert_eq!(ns.increment("hits").unwrap(), 1.0);
    assert_eq!(ns.increment_by("hits", 4.0).unwrap(), 5.0);
    assert_eq!(ns.decrement("hits").unwrap(), 4.0);
    assert!(ns.toggle("on").unwrap());
    assert_eq!(store.get_num("app.hits"), Some(4.0));
    assert_eq!(store.get_bool("app.on"), Some(true));
}

#[test]
fn computed_flags_in_a_namespace_prefix_their_deps() {
    let store = FlagStore::new();
    let ns = store.namespace("app").unwrap();
    ns.set("a", 2).unwrap();
    ns.compute("double", &["a"], |args| {
        Ok(FlagValue::Num(
            FlagValue::num_or_zero(args[0].as_ref()) * 2.0,
        ))
    })
    .unwrap();

    assert_eq!(ns.get_num("double"), Some(4.0));
    assert_eq!(store.get_num("app.double"), Some(4.0));

    // The dependency is the namespaced key, not the bare one.
    store.set("a", 100).unwrap();
    assert_eq!(ns.get_num("double"), Some(4.0));
    ns.set("a", 3).unwrap();
    assert_eq!(ns.get_num("double"), Some(6.0));
}

#[test]
fn set_many_through_a_view_stays_one_step() {
    let store = FlagStore::builder()
        .history(HistoryOptions::default())
        .build()
        .unwrap();
    let ns = store.namespace("app").unwrap();
    ns.set_many([("a", 1), ("b", 2)]).unwrap();
    assert_eq!(store.history_len(), 1);
    assert_eq!(store.get_num("app.a"), Some(1.0));
    assert_eq!(store.get_num("app.b"), Some(2.0));
}

#[test]
fn per_key_subscription_delivers_stripped_keys() {
    let store = FlagStore::new();
    let ns = store.namespace("app").unwrap();
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = Rc::clone(&seen);
    let _sub = ns.subscribe_key("x", move |event| {
        seen_cb.borrow_mut().push(event.key.to_owned());
    });

    ns.set("x", 1).unwrap();
    store.set("app.x", 2).unwrap();
    assert_eq!(*seen.borrow(), vec!["x", "x"]);
}

#[test]
fn scoped_global_subscriber_never_sees_synthetic_events() {
    let store = FlagStore::new();
    let ns = store.namespace("app").unwrap();
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = Rc::clone(&seen);
    let _sub = ns.subscribe(move |event| seen_cb.borrow_mut().push(event.key.to_owned()));

    store
        .batch(|| {
            store.set("app.x", 1)?;
            store.set("elsewhere", 2)?;
            Ok(())
        })
        .unwrap();

    // The scoped wrapper sits on the root global list, which received only
    // `__batch__` — and synthetic keys never match the prefix.
    assert!(seen.borrow().is_empty());

    store.set("app.y", 3).unwrap();
    assert_eq!(*seen.borrow(), vec!["y"]);
}

#[test]
fn sibling_namespaces_are_isolated() {
    let store = FlagStore::new();
    let a = store.namespace("a").unwrap();
    let b = store.namespace("b").unwrap();
    a.set("k", 1).unwrap();
    b.set("k", 2).unwrap();

    assert_eq!(a.get_num("k"), Some(1.0));
    assert_eq!(b.get_num("k"), Some(2.0));

    a.clear();
    assert!(!a.has("k"));
    assert_eq!(b.get_num("k"), Some(2.0));
    assert_eq!(a.keys(), Vec::<String>::new());
    assert_eq!(b.keys(), vec!["k"]);
}

#[test]
fn undo_reaches_through_to_namespaced_writes() {
    let store = FlagStore::builder()
        .history(HistoryOptions::default())
        .build()
        .unwrap();
    let ns = store.namespace("app").unwrap();
    ns.set("k", 1).unwrap();
    assert!(store.undo());
    assert!(!ns.has("k"));
}
