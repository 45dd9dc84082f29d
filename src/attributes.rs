//! Span attribute composition following the OpenTelemetry database semantic
//! conventions, with legacy keys emitted alongside their replacements so
//! older trace consumers keep working.

use opentelemetry::KeyValue;

use crate::client::{ClientOperation, ConnectionParams};
use crate::config::InstrumentationConfig;

/// Database system identifier reported on every span.
pub const DB_SYSTEM: &str = "clickhouse";

/// Attribute keys used on emitted spans.
pub mod keys {
    /// Database system name.
    pub const DB_SYSTEM_NAME: &str = "db.system.name";
    /// Database system name (deprecated key).
    pub const DB_SYSTEM: &str = "db.system";
    /// Name of the executed operation.
    pub const DB_OPERATION_NAME: &str = "db.operation.name";
    /// Name of the executed operation (deprecated key).
    pub const DB_OPERATION: &str = "db.operation";
    /// Query text, normalized and possibly truncated.
    pub const DB_QUERY_TEXT: &str = "db.query.text";
    /// Query text (deprecated key).
    pub const DB_STATEMENT: &str = "db.statement";
    /// Target table of the operation.
    pub const DB_COLLECTION_NAME: &str = "db.collection.name";
    /// Database the client is bound to.
    pub const DB_NAMESPACE: &str = "db.namespace";
    /// Database the client is bound to (deprecated key).
    pub const DB_NAME: &str = "db.name";
    /// Server hostname.
    pub const SERVER_ADDRESS: &str = "server.address";
    /// Server port.
    pub const SERVER_PORT: &str = "server.port";
}

/// Span name for an operation, qualified by table when one was resolved.
pub(crate) fn span_name(operation: ClientOperation, table: Option<&str>) -> String {
    match table {
        Some(table) => format!("{}.{} {}", DB_SYSTEM, operation.as_str(), table),
        None => format!("{}.{}", DB_SYSTEM, operation.as_str()),
    }
}

/// Compose the attribute set for one intercepted call.
///
/// Facts that are absent (no table resolved, no connection params, capture
/// disabled) leave their attributes out entirely; nothing is ever set to a
/// placeholder value.
pub(crate) fn build_attributes(
    connection: Option<&ConnectionParams>,
    operation: ClientOperation,
    table: Option<&str>,
    query_text: Option<&str>,
    config: &InstrumentationConfig,
) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(keys::DB_SYSTEM_NAME, DB_SYSTEM),
        KeyValue::new(keys::DB_SYSTEM, DB_SYSTEM),
        KeyValue::new(keys::DB_OPERATION_NAME, operation.as_str()),
        KeyValue::new(keys::DB_OPERATION, operation.as_str()),
    ];

    if let Some(table) = table {
        attributes.push(KeyValue::new(keys::DB_COLLECTION_NAME, table.to_string()));
    }

    if config.max_query_length > 0 {
        if let Some(text) = query_text.filter(|text| !text.is_empty()) {
            let text = truncate_query(text, config.max_query_length);
            attributes.push(KeyValue::new(keys::DB_QUERY_TEXT, text.clone()));
            attributes.push(KeyValue::new(keys::DB_STATEMENT, text));
        }
    }

    if let Some(connection) = connection {
        if let Some(host) = connection.url.host_str() {
            attributes.push(KeyValue::new(keys::SERVER_ADDRESS, host.to_string()));
        }
        if let Some(port) = connection.url.port() {
            attributes.push(KeyValue::new(keys::SERVER_PORT, i64::from(port)));
        }
        if let Some(database) = &connection.database {
            attributes.push(KeyValue::new(keys::DB_NAMESPACE, database.clone()));
            attributes.push(KeyValue::new(keys::DB_NAME, database.clone()));
        }
    }

    attributes
}

/// Truncate to `max_chars` characters, marking the cut with `...`.
fn truncate_query(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
