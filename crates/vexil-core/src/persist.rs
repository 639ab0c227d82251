// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence port and snapshot codec.
//!
//! The store persists through an abstract key → string blob port. Only
//! plain entries are serialized; computed definitions and history are
//! reconstructed by code, not data. The snapshot encoding is pretty-printed
//! JSON with sorted keys (the registry map is ordered), so persisted state
//! is stable and diff-friendly.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::BackendError;
use crate::value::FlagValue;

/// Default blob key used when [`PersistOptions`] does not override it.
pub const DEFAULT_BLOB_KEY: &str = "vexil";

/// Abstract blob store the registry persists through.
pub trait StorageBackend {
    /// Reads the blob at `key`; `Ok(None)` when absent.
    fn read(&self, key: &str) -> Result<Option<String>, BackendError>;
    /// Writes (or replaces) the blob at `key`.
    fn write(&self, key: &str, blob: &str) -> Result<(), BackendError>;
    /// Removes the blob at `key`; absent is not an error.
    fn remove(&self, key: &str) -> Result<(), BackendError>;
}

/// In-memory backend; clones share the same blob map.
///
/// The sharing makes it the natural test double: keep a clone, hand the
/// other to the store, then inspect what autosave wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    blobs: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    /// `true` when no blob is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.blobs.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), BackendError> {
        self.blobs.borrow_mut().insert(key.to_owned(), blob.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.blobs.borrow_mut().remove(key);
        Ok(())
    }
}

/// Persistence configuration for a store.
pub struct PersistOptions {
    pub(crate) backend: Box<dyn StorageBackend>,
    pub(crate) blob_key: String,
    pub(crate) auto_save: bool,
}

impl PersistOptions {
    /// Persistence through `backend` under [`DEFAULT_BLOB_KEY`], with
    /// autosave enabled.
    #[must_use]
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            blob_key: DEFAULT_BLOB_KEY.to_owned(),
            auto_save: true,
        }
    }

    /// Overrides the blob key.
    #[must_use]
    pub fn blob_key(mut self, key: impl Into<String>) -> Self {
        self.blob_key = key.into();
        self
    }

    /// Enables or disables autosave (on by default). With autosave off,
    /// call `FlagStore::save` explicitly.
    #[must_use]
    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }
}

impl std::fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistOptions")
            .field("blob_key", &self.blob_key)
            .field("auto_save", &self.auto_save)
            .finish_non_exhaustive()
    }
}

/// Encodes the plain-entry snapshot.
pub(crate) fn encode_snapshot(
    plain: &BTreeMap<String, FlagValue>,
) -> Result<String, BackendError> {
    Ok(serde_json::to_string_pretty(plain)?)
}

/// Decodes a snapshot blob back into a plain-entry map.
pub(crate) fn decode_snapshot(blob: &str) -> Result<BTreeMap<String, FlagValue>, BackendError> {
    Ok(serde_json::from_str(blob)?)
}
