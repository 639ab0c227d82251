// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! vexil-core: embedded, in-process reactive flag store.
//!
//! A keyed mapping from string identifiers to scalar values (booleans,
//! numbers, strings) with atomic reads and writes, numeric counters,
//! boolean toggles, bulk mutation, change notification, computed flags
//! with dependency tracking, bounded undo/redo history, hierarchical
//! namespaces, and durable persistence through a pluggable backend.
//!
//! Four subsystems share one mutation path and one ordering: the registry,
//! the notification pipeline, the computed graph, and the history log. The
//! store is single-threaded cooperative — every operation runs to
//! completion on the calling thread, and subscriber callbacks may re-enter
//! the store freely.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod computed;
mod diag;
mod error;
mod event;
mod history;
mod key;
mod namespace;
mod notify;
mod persist;
mod registry;
mod store;
mod value;

// Re-exports for stable public API
/// Compute function plumbing for derived flags.
pub use computed::{ComputeFailure, ComputeFn};
/// Diagnostic sink seam for contained user-code failures.
pub use diag::{DiagnosticSink, NullDiagnosticSink, TracingDiagnosticSink};
/// Discriminated error kinds.
pub use error::{BackendError, StoreError};
/// Change records and subscriber events.
pub use event::{ChangeEvent, ChangeRecord};
/// History configuration.
pub use history::HistoryOptions;
/// Key validation and the reserved synthetic event names.
pub use key::{is_reserved, validate_key, EVENT_BATCH, EVENT_CLEAR, EVENT_SET_MANY};
/// Prefixed views over a store subtree.
pub use namespace::Namespace;
/// Subscription handles.
pub use notify::Subscription;
/// Persistence port, options, and the in-memory backend.
pub use persist::{MemoryBackend, PersistOptions, StorageBackend, DEFAULT_BLOB_KEY};
/// The store itself and its builder.
pub use store::{FlagStore, StoreBuilder};
/// The scalar value universe.
pub use value::{truthy, FlagValue};
