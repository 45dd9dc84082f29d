//! Configuration for instrumentation behavior.

/// Configuration options for ClickHouse client instrumentation.
///
/// The configuration is frozen when the instrumentation is constructed;
/// every intercepted call reads the same immutable snapshot.
///
/// # Example
///
/// ```rust
/// use clickhouse_tracing::InstrumentationConfig;
///
/// let config = InstrumentationConfig::default()
///     .with_max_query_length(1024)
///     .with_require_parent_span(true);
/// ```
#[derive(Debug, Clone)]
pub struct InstrumentationConfig {
    /// Maximum number of characters of query text captured in spans.
    /// `0` disables query-text capture entirely.
    /// Default: `2048`
    pub max_query_length: usize,

    /// When `true`, calls made with no active parent span bypass
    /// instrumentation and execute the original method directly.
    /// Default: `false`
    pub require_parent_span: bool,

    /// When `true`, the original call runs inside a scope that tells nested
    /// automatic instrumentation (e.g. of the underlying HTTP transport) not
    /// to create spans, so one logical operation is not counted twice.
    /// Default: `true`
    pub suppress_internal_instrumentation: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            max_query_length: 2048,
            require_parent_span: false,
            suppress_internal_instrumentation: true,
        }
    }
}

impl InstrumentationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of characters of query text captured in spans.
    ///
    /// Longer queries are truncated and marked with a trailing `...`.
    /// Passing `0` disables query-text capture.
    pub fn with_max_query_length(mut self, max_query_length: usize) -> Self {
        self.max_query_length = max_query_length;
        self
    }

    /// Only trace calls that already run under an active span.
    ///
    /// Useful when root database spans without a surrounding request span
    /// are just noise in your traces.
    pub fn with_require_parent_span(mut self, enabled: bool) -> Self {
        self.require_parent_span = enabled;
        self
    }

    /// Enable or disable suppression of nested transport instrumentation
    /// while the original call executes.
    pub fn with_suppress_internal_instrumentation(mut self, enabled: bool) -> Self {
        self.suppress_internal_instrumentation = enabled;
        self
    }
}
