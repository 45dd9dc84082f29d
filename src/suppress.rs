//! Scoped suppression of nested automatic instrumentation.
//!
//! The client executes its requests over an HTTP transport that may carry its
//! own auto-instrumentation. Running the original call inside a suppressed
//! context tells that layer to skip span creation, so one logical database
//! operation is not recorded twice. The marker rides on
//! [`opentelemetry::Context`]; this module only sets and reads it -- the
//! scoping discipline (attach/detach, propagation across polls) belongs to
//! the context mechanism itself.

use opentelemetry::Context;

#[derive(Debug, Clone, Copy)]
struct SuppressTracing;

/// Derive a context in which nested auto-instrumentation is suppressed.
pub fn suppress_tracing(cx: &Context) -> Context {
    cx.with_value(SuppressTracing)
}

/// Whether `cx` carries the suppression marker.
pub fn is_tracing_suppressed(cx: &Context) -> bool {
    cx.get::<SuppressTracing>().is_some()
}

/// Whether the current ambient context carries the suppression marker.
///
/// Transport-level instrumentation checks this before creating spans of its
/// own.
pub fn is_current_tracing_suppressed() -> bool {
    is_tracing_suppressed(&Context::current())
}
