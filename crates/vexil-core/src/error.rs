// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error kinds raised by the store.
//!
//! Callers distinguish failures by enum discriminant, not by downcasting.
//! Failures originating in *user* code — subscriber callbacks and compute
//! functions — are never surfaced here: the store contains them (see the
//! notification pipeline and computed graph) so that misbehaving user code
//! cannot leave the registry inconsistent.

use thiserror::Error;

/// Errors emitted by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is empty or uses the reserved `__…__` namespace.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
    /// A numeric operation hit a non-number, or a toggle hit a non-boolean.
    #[error("type mismatch on {key:?}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Key the operation targeted.
        key: String,
        /// Tag the operation required.
        expected: &'static str,
        /// Tag actually stored under the key.
        found: &'static str,
    },
    /// A write-style operation targeted a computed flag.
    #[error("computed flag is read-only: {0:?}")]
    ReadOnlyComputed(String),
    /// `compute` targeted a key already held by a plain flag.
    #[error("key already holds a plain flag: {0:?}")]
    KeyConflict(String),
    /// Registering the computed flag would create a dependency cycle.
    #[error("circular dependency through {0:?}")]
    CircularDependency(String),
    /// The persistence backend failed while loading or saving.
    #[error("storage backend: {0}")]
    Backend(#[from] BackendError),
}

/// Errors emitted by a persistence backend or the snapshot codec.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored blob is not a valid snapshot.
    #[error("malformed snapshot: {0}")]
    Malformed(String),
    /// Backend-specific failure that is neither I/O nor decoding.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
