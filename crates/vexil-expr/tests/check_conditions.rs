// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end condition checks against live stores and namespaces.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use vexil_core::{FlagStore, FlagValue};
use vexil_expr::{Check, ParseError};

fn seeded_store() -> FlagStore {
    let store = FlagStore::new();
    store.set("dark_mode", true).unwrap();
    store.set("visits", 5).unwrap();
    store.set("tier", "gold").unwrap();
    store
}

#[test]
fn conditions_read_live_store_state() {
    let store = seeded_store();
    assert!(store.check("dark_mode").unwrap());
    assert!(store.check("visits > 3").unwrap());
    assert!(store.check("dark_mode AND visits >= 5").unwrap());
    assert!(store.check("tier == 'gold'").unwrap());
    assert!(!store.check("tier == 'silver'").unwrap());

    store.set("visits", 1).unwrap();
    assert!(!store.check("visits > 3").unwrap());
}

#[test]
fn computed_flags_participate_in_conditions() {
    let store = seeded_store();
    store
        .compute("frequent", &["visits"], |args| {
            Ok(FlagValue::Bool(
                FlagValue::num_or_zero(args[0].as_ref()) >= 3.0,
            ))
        })
        .unwrap();
    assert!(store.check("frequent").unwrap());
    store.set("visits", 1).unwrap();
    assert!(!store.check("frequent").unwrap());
}

#[test]
fn absent_flags_are_falsy_and_compare_as_zero() {
    let store = FlagStore::new();
    assert!(!store.check("missing").unwrap());
    assert!(store.check("NOT missing").unwrap());
    assert!(store.check("missing == 0").unwrap());
    assert!(store.check("missing < 1").unwrap());
}

#[test]
fn malformed_expressions_surface_parse_errors() {
    let store = FlagStore::new();
    assert!(matches!(store.check(""), Err(ParseError::UnexpectedEnd)));
    assert!(matches!(
        store.check("a ==="),
        Err(ParseError::UnexpectedChar { .. })
    ));
    assert!(matches!(
        store.check("(a OR"),
        Err(ParseError::UnexpectedEnd)
    ));
}

#[test]
fn namespace_checks_prefix_identifiers_transparently() {
    let store = FlagStore::new();
    let ns = store.namespace("app").unwrap();
    ns.set("x", 7).unwrap();
    store.set("x", 0).unwrap();

    // ns.check(e) == root.check(e with ids prefixed)
    assert_eq!(
        ns.check("x > 3").unwrap(),
        store.check("app.x > 3").unwrap()
    );
    assert!(ns.check("x > 3").unwrap());
    assert!(!store.check("x > 3").unwrap(), "root sees its own x");
}

#[test]
fn nested_namespace_checks_compose_prefixes() {
    let store = FlagStore::new();
    let inner = store.namespace("a").unwrap().namespace("b").unwrap();
    inner.set("flag", true).unwrap();
    assert!(inner.check("flag").unwrap());
    assert!(store.check("a.b.flag").unwrap());
}

#[test]
fn literals_only_conditions_work_without_any_flags() {
    let store = FlagStore::new();
    assert!(store.check("1 < 2").unwrap());
    assert!(store.check("'a' != 'b'").unwrap());
    assert!(!store.check("0").unwrap());
}
