//! Span lifecycle: creation, context-scoped execution of the wrapped call,
//! and terminal status assignment on every return path.

use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use crate::client::{CallOutcome, CallResult, ClientError};
use crate::config::InstrumentationConfig;
use crate::suppress;

/// Open a client-kind span, run `call` inside its context, and finalize the
/// span once the outcome is known.
///
/// Synchronous outcomes are finalized before this function returns; deferred
/// outcomes through a continuation attached to the returned future, whether
/// or not the caller ever looks at the result. The wrapped call's result is
/// passed through unchanged in both cases.
pub(crate) fn execute_traced<T>(
    tracer: &T,
    config: &InstrumentationConfig,
    parent_cx: &Context,
    name: String,
    attributes: Vec<KeyValue>,
    call: impl FnOnce() -> CallOutcome,
) -> CallOutcome
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    let span = tracer
        .span_builder(name)
        .with_kind(SpanKind::Client)
        .with_attributes(attributes)
        .start_with_context(tracer, parent_cx);

    let mut cx = parent_cx.with_span(span);
    if config.suppress_internal_instrumentation {
        cx = suppress::suppress_tracing(&cx);
    }

    // The synchronous extent of the call runs with the span active, so any
    // work it does before returning lands under the right parent.
    let outcome = {
        let _guard = cx.clone().attach();
        call()
    };

    match outcome {
        CallOutcome::Ready(result) => {
            finish_span(&cx, &result);
            CallOutcome::Ready(result)
        }
        CallOutcome::Deferred(future) => {
            let finish_cx = cx.clone();
            CallOutcome::deferred(
                async move {
                    let result = future.await;
                    finish_span(&finish_cx, &result);
                    result
                }
                .with_context(cx),
            )
        }
    }
}

/// Set the terminal status from the call's result and end the span.
fn finish_span(cx: &Context, result: &Result<CallResult, ClientError>) {
    let span = cx.span();
    match result {
        Ok(_) => span.set_status(Status::Ok),
        Err(err) => {
            span.record_error(err);
            span.set_status(Status::error(err.to_string()));
        }
    }
    span.end();
}
