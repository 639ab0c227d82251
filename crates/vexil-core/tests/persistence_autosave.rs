// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence: load-merge at build time, autosave after broadcast, and
//! the plain-only snapshot shape.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use vexil_core::{
    FlagStore, FlagValue, HistoryOptions, MemoryBackend, PersistOptions, StorageBackend,
    DEFAULT_BLOB_KEY,
};

fn persisted_map(backend: &MemoryBackend) -> BTreeMap<String, FlagValue> {
    let blob = backend
        .read(DEFAULT_BLOB_KEY)
        .unwrap()
        .expect("blob present");
    serde_json::from_str(&blob).unwrap()
}

fn store_with(backend: &MemoryBackend) -> FlagStore {
    FlagStore::builder()
        .persist(PersistOptions::new(backend.clone()))
        .history(HistoryOptions::default())
        .build()
        .unwrap()
}

#[test]
fn every_plain_mutation_autosaves() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    store.set("a", 1).unwrap();
    assert_eq!(persisted_map(&backend).get("a"), Some(&FlagValue::Num(1.0)));

    store.toggle("b").unwrap();
    store.delete("a").unwrap();
    let snapshot = persisted_map(&backend);
    assert_eq!(snapshot.get("b"), Some(&FlagValue::Bool(true)));
    assert!(!snapshot.contains_key("a"));
}

#[test]
fn computed_flags_are_not_persisted() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    store.set("x", 2).unwrap();
    store
        .compute("double", &["x"], |args| {
            Ok(FlagValue::Num(
                FlagValue::num_or_zero(args[0].as_ref()) * 2.0,
            ))
        })
        .unwrap();
    store.set("x", 3).unwrap();

    let snapshot = persisted_map(&backend);
    assert!(snapshot.contains_key("x"));
    assert!(
        !snapshot.contains_key("double"),
        "definitions are code, not data"
    );
}

#[test]
fn reload_round_trips_the_plain_registry() {
    let backend = MemoryBackend::new();
    {
        let store = store_with(&backend);
        store.set("dark_mode", true).unwrap();
        store.set("retries", 3).unwrap();
        store.set("greeting", "hello").unwrap();
    }
    let reloaded = store_with(&backend);
    assert_eq!(reloaded.get_bool("dark_mode"), Some(true));
    assert_eq!(reloaded.get_num("retries"), Some(3.0));
    assert_eq!(reloaded.get_str("greeting").as_deref(), Some("hello"));
}

#[test]
fn undo_and_redo_autosave_when_plain_state_changes() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    store.set("k", 1).unwrap();
    store.set("k", 2).unwrap();

    store.undo();
    assert_eq!(persisted_map(&backend).get("k"), Some(&FlagValue::Num(1.0)));
    store.redo();
    assert_eq!(persisted_map(&backend).get("k"), Some(&FlagValue::Num(2.0)));
}

#[test]
fn clear_history_does_not_autosave() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    store.set("k", 1).unwrap();
    let before = backend.read(DEFAULT_BLOB_KEY).unwrap();

    store.clear_history();
    assert_eq!(backend.read(DEFAULT_BLOB_KEY).unwrap(), before);
}

#[test]
fn batch_autosaves_once_at_commit() {
    #[derive(Clone, Default)]
    struct CountingBackend {
        inner: MemoryBackend,
        writes: Rc<RefCell<u32>>,
    }
    impl StorageBackend for CountingBackend {
        fn read(&self, key: &str) -> Result<Option<String>, vexil_core::BackendError> {
            self.inner.read(key)
        }
        fn write(&self, key: &str, blob: &str) -> Result<(), vexil_core::BackendError> {
            *self.writes.borrow_mut() += 1;
            self.inner.write(key, blob)
        }
        fn remove(&self, key: &str) -> Result<(), vexil_core::BackendError> {
            self.inner.remove(key)
        }
    }

    let backend = CountingBackend::default();
    let writes = Rc::clone(&backend.writes);
    let store = FlagStore::builder()
        .persist(PersistOptions::new(backend))
        .build()
        .unwrap();

    store
        .batch(|| {
            store.set("a", 1)?;
            store.set("b", 2)?;
            store.set("c", 3)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(*writes.borrow(), 1);
}

#[test]
fn manual_save_works_with_autosave_off() {
    let backend = MemoryBackend::new();
    let store = FlagStore::builder()
        .persist(PersistOptions::new(backend.clone()).auto_save(false))
        .build()
        .unwrap();

    store.set("k", 1).unwrap();
    assert!(
        backend.read(DEFAULT_BLOB_KEY).unwrap().is_none(),
        "no write without autosave"
    );

    store.save().unwrap();
    assert_eq!(persisted_map(&backend).get("k"), Some(&FlagValue::Num(1.0)));
}

#[test]
fn custom_blob_key_is_respected() {
    let backend = MemoryBackend::new();
    let store = FlagStore::builder()
        .persist(PersistOptions::new(backend.clone()).blob_key("feature-flags"))
        .build()
        .unwrap();
    store.set("k", 1).unwrap();
    assert!(backend.read("feature-flags").unwrap().is_some());
    assert!(backend.read(DEFAULT_BLOB_KEY).unwrap().is_none());
}

#[test]
fn corrupt_blob_fails_the_build() {
    let backend = MemoryBackend::new();
    backend.write(DEFAULT_BLOB_KEY, "{ not json").unwrap();
    let err = FlagStore::builder()
        .persist(PersistOptions::new(backend))
        .build();
    assert!(matches!(err, Err(vexil_core::StoreError::Backend(_))));
}

#[test]
fn subscribers_run_before_the_persist_write() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    let observed: Rc<RefCell<Option<bool>>> = Rc::new(RefCell::new(None));
    let observed_cb = Rc::clone(&observed);
    let backend_cb = backend.clone();
    let _sub = store.subscribe_key("k", move |_| {
        // The pre-persist state is observable from a subscriber.
        *observed_cb.borrow_mut() =
            Some(backend_cb.read(DEFAULT_BLOB_KEY).unwrap().is_none());
    });

    store.set("k", 1).unwrap();
    assert_eq!(*observed.borrow(), Some(true));
    assert!(backend.read(DEFAULT_BLOB_KEY).unwrap().is_some());
}
