//! # clickhouse-tracing
//!
//! OpenTelemetry tracing instrumentation for ClickHouse database clients.
//!
//! This crate instruments a ClickHouse client's data-access methods in place:
//! once enabled against the loaded client module, every `query`, `insert`,
//! `command` and `exec` call produces a client-kind span with database
//! semantic-convention attributes, without any change to calling code.
//!
//! ## Features
//!
//! - **Automatic Instrumentation**: the client's methods are wrapped in
//!   place; callers keep their exact API and behavior
//! - **OpenTelemetry Compatible**: spans follow the database semantic
//!   conventions, emitting current and legacy attribute keys side by side
//! - **Proper Span Nesting**: database spans become children of whatever
//!   span is active when the call is made
//! - **Table Attribution**: best-effort table extraction from SQL text, or
//!   the explicit insert target when one is given
//! - **Transport Suppression**: the wrapped call runs in a scope that tells
//!   lower-level auto-instrumentation to stay quiet, so one operation is
//!   never counted twice
//! - **Leak-Free Lifecycle**: spans reach a terminal status on success,
//!   failure, synchronous error and fire-and-forget paths alike
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clickhouse_tracing::{ClickhouseInstrumentation, InstrumentationConfig};
//!
//! // Created once; the host loader hands it the client module.
//! let instrumentation = ClickhouseInstrumentation::new(InstrumentationConfig::default());
//! instrumentation.enable(&module);
//!
//! // Every call through the module's clients is now traced.
//! let client = module.client(Some(connection)).unwrap();
//! client.query(CallParams::query("SELECT 1")).resolve().await?;
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use clickhouse_tracing::InstrumentationConfig;
//!
//! let config = InstrumentationConfig::default()
//!     .with_max_query_length(1024)        // truncate captured SQL (0 disables)
//!     .with_require_parent_span(true)     // skip calls outside a trace
//!     .with_suppress_internal_instrumentation(true);
//! ```
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `db.system.name` / `db.system` | Always `"clickhouse"` |
//! | `db.operation.name` / `db.operation` | `query`, `insert`, `command` or `exec` |
//! | `db.collection.name` | Target table (when resolvable) |
//! | `db.query.text` / `db.statement` | Normalized, truncated SQL (when capture is enabled) |
//! | `db.namespace` / `db.name` | Database name from the connection |
//! | `server.address` / `server.port` | Server endpoint from the connection URL |
//!
//! Span names are `clickhouse.<operation>`, extended with the table name when
//! one was resolved (`clickhouse.query orders`).

mod attributes;
mod client;
mod config;
mod instrumentation;
mod parser;
mod span;
mod suppress;

pub use attributes::{keys, DB_SYSTEM};
pub use client::{
    CallFuture, CallOutcome, CallParams, CallResult, Client, ClientError, ClientMethods,
    ClientModule, ClientOperation, ConnectionParams, MethodHandler, MethodTable,
};
pub use config::InstrumentationConfig;
pub use instrumentation::{ClickhouseInstrumentation, MODULE_NAME, SUPPORTED_VERSIONS};
pub use suppress::{is_current_tracing_suppressed, is_tracing_suppressed, suppress_tracing};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CallOutcome, CallParams, ClickhouseInstrumentation, ClientModule, InstrumentationConfig,
    };
}
