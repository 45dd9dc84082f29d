//! Method interception: installing and removing instrumented replacements on
//! the client's method table, and the per-call pipeline those replacements
//! run.

use std::collections::HashMap;
use std::sync::Arc;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{TraceContextExt, Tracer};
use opentelemetry::{Context, InstrumentationScope};
use parking_lot::Mutex;

use crate::attributes;
use crate::client::{
    CallParams, Client, ClientMethods, ClientModule, ClientOperation, MethodHandler,
};
use crate::config::InstrumentationConfig;
use crate::parser;
use crate::span;

/// Name of the client module this instrumentation patches.
pub const MODULE_NAME: &str = "clickhouse";

/// Client versions the patch is known to work against.
pub const SUPPORTED_VERSIONS: &str = ">=0.1";

/// Automatic tracing instrumentation for ClickHouse clients.
///
/// Created once and handed the wrapped module through [`enable`] when the
/// host loads it (and [`disable`] when it unloads). Between those two points
/// every call to the client's `query`, `insert`, `command` and `exec`
/// methods produces one client-kind span, finalized on success, failure and
/// fire-and-forget paths alike. The wrapped methods keep their exact
/// behavior; callers observe nothing but the added telemetry.
///
/// [`enable`]: ClickhouseInstrumentation::enable
/// [`disable`]: ClickhouseInstrumentation::disable
///
/// # Example
///
/// ```rust,ignore
/// use clickhouse_tracing::{ClickhouseInstrumentation, InstrumentationConfig};
///
/// let instrumentation = ClickhouseInstrumentation::new(InstrumentationConfig::default());
/// instrumentation.enable(&module);
/// ```
pub struct ClickhouseInstrumentation<T = BoxedTracer> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    config: InstrumentationConfig,
    tracer: T,
    /// Patched methods: the original implementation plus the wrapper
    /// currently standing in for it. Wrapper identity is what install and
    /// uninstall check instead of guessing from the table's contents.
    installed: Mutex<HashMap<ClientOperation, InstalledMethod>>,
}

struct InstalledMethod {
    original: MethodHandler,
    wrapper: MethodHandler,
}

impl<T> Clone for ClickhouseInstrumentation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ClickhouseInstrumentation<BoxedTracer> {
    /// Create an instrumentation backed by the globally registered tracer
    /// provider.
    pub fn new(config: InstrumentationConfig) -> Self {
        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        Self::with_tracer(global::tracer_with_scope(scope), config)
    }
}

impl<T> ClickhouseInstrumentation<T>
where
    T: Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    /// Create an instrumentation that emits spans through `tracer`.
    pub fn with_tracer(tracer: T, config: InstrumentationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                tracer,
                installed: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The configuration snapshot every intercepted call reads.
    pub fn config(&self) -> &InstrumentationConfig {
        &self.inner.config
    }

    /// Module the host loader should hand to [`enable`].
    ///
    /// [`enable`]: ClickhouseInstrumentation::enable
    pub fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    /// Version range of the client this patch supports.
    pub fn supported_versions(&self) -> &'static str {
        SUPPORTED_VERSIONS
    }

    /// Module-load callback: instrument the client's data-access methods.
    ///
    /// A module that does not expose a client method table is passed through
    /// untouched.
    pub fn enable(&self, module: &ClientModule) {
        let Some(methods) = module.client_methods() else {
            tracing::debug!(
                module = MODULE_NAME,
                "module does not expose a client method table, skipping"
            );
            return;
        };
        for operation in ClientOperation::ALL {
            self.install(methods, operation);
        }
    }

    /// Module-unload callback: restore the original methods.
    pub fn disable(&self, module: &ClientModule) {
        let Some(methods) = module.client_methods() else {
            return;
        };
        for operation in ClientOperation::ALL {
            self.uninstall(methods, operation);
        }
    }

    /// Replace `operation`'s handler with an instrumented wrapper.
    ///
    /// Idempotent: a wrapper this instrumentation installed earlier is
    /// removed first, so exactly one wrapper is ever active per method --
    /// repeated module reloads do not stack instrumentation. A method the
    /// table does not expose is skipped.
    pub fn install(&self, methods: &ClientMethods, operation: ClientOperation) {
        let mut installed = self.inner.installed.lock();

        let Some(mut current) = methods.handler(operation) else {
            tracing::debug!(method = %operation, "client does not expose method, skipping");
            return;
        };

        if let Some(previous) = installed.remove(&operation) {
            if Arc::ptr_eq(&current, &previous.wrapper) {
                current = previous.original;
            }
            tracing::debug!(method = %operation, "removed previously installed wrapper");
        }

        let wrapper = self.instrumented_handler(operation, Arc::clone(&current));
        methods.set_handler(operation, Arc::clone(&wrapper));
        installed.insert(
            operation,
            InstalledMethod {
                original: current,
                wrapper,
            },
        );
        tracing::debug!(method = %operation, "instrumented client method");
    }

    /// Restore `operation`'s original handler.
    ///
    /// No-op when the method is not currently wrapped. A handler that was
    /// replaced externally after install is left alone.
    pub fn uninstall(&self, methods: &ClientMethods, operation: ClientOperation) {
        let mut installed = self.inner.installed.lock();

        let Some(entry) = installed.remove(&operation) else {
            return;
        };
        match methods.handler(operation) {
            Some(current) if Arc::ptr_eq(&current, &entry.wrapper) => {
                methods.set_handler(operation, entry.original);
                tracing::debug!(method = %operation, "restored original client method");
            }
            _ => {
                tracing::debug!(
                    method = %operation,
                    "method was replaced externally, leaving it in place"
                );
            }
        }
    }

    /// Build the wrapper that stands in for `operation`'s original handler.
    ///
    /// The wrapper forwards the receiver and parameters to the original
    /// unchanged and returns the original's outcome unchanged; the only added
    /// effect is the span around it.
    fn instrumented_handler(
        &self,
        operation: ClientOperation,
        original: MethodHandler,
    ) -> MethodHandler {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |client: &Client, params: CallParams| {
            let parent_cx = Context::current();
            if inner.config.require_parent_span && !parent_cx.has_active_span() {
                return original(client, params);
            }

            let table = parser::resolve_table(operation, &params);
            let query_text = params.query.as_deref().map(parser::normalize_query);
            let span_attributes = attributes::build_attributes(
                client.connection_params(),
                operation,
                table.as_deref(),
                query_text.as_deref(),
                &inner.config,
            );
            let name = attributes::span_name(operation, table.as_deref());

            span::execute_traced(
                &inner.tracer,
                &inner.config,
                &parent_cx,
                name,
                span_attributes,
                || original(client, params),
            )
        })
    }
}
