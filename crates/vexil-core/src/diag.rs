// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Diagnostic sink for contained user-code failures.
//!
//! The store swallows two classes of user failures by design: panicking
//! subscriber callbacks (delivery continues with the next subscriber) and
//! failing compute functions (the cached value is retained). Subscriber
//! failures are reported through this sink so they remain observable;
//! compute failures are intentionally silent.
//!
//! The sink is injected at store construction. [`TracingDiagnosticSink`]
//! is the default; [`NullDiagnosticSink`] keeps tests quiet.

use crate::error::BackendError;

/// Receiver for contained failures the store does not surface as errors.
pub trait DiagnosticSink {
    /// A subscriber callback panicked during delivery of `key`.
    ///
    /// `detail` is the stringified panic payload when one was available.
    fn subscriber_failure(&self, key: &str, detail: &str) {
        let _ = (key, detail);
    }

    /// An autosave write failed after the mutation had already committed.
    fn autosave_failure(&self, error: &BackendError) {
        let _ = error;
    }
}

/// Sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnosticSink;

impl DiagnosticSink for NullDiagnosticSink {}

/// Default sink: forwards reports to `tracing` at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn subscriber_failure(&self, key: &str, detail: &str) {
        tracing::warn!(key, detail, "subscriber panicked; skipped");
    }

    fn autosave_failure(&self, error: &BackendError) {
        tracing::warn!(%error, "autosave failed; registry state unaffected");
    }
}

/// Extracts a printable message from a panic payload.
#[must_use]
pub(crate) fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
