//! Boundary model of the instrumented ClickHouse client module.
//!
//! This crate does not ship a ClickHouse driver. It operates on the surface
//! the host loader hands it: a module exposing a client type whose
//! data-access methods dispatch through a shared, replaceable method table.
//! Replacing an entry in that table affects every client created from the
//! module, which is exactly what the interceptor relies on.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use url::Url;

/// The client methods subject to instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientOperation {
    Query,
    Insert,
    Command,
    Exec,
}

impl ClientOperation {
    /// Every instrumented method, in patch order.
    pub const ALL: [ClientOperation; 4] = [
        ClientOperation::Query,
        ClientOperation::Insert,
        ClientOperation::Command,
        ClientOperation::Exec,
    ];

    /// Returns the method name as used in span names and attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientOperation::Query => "query",
            ClientOperation::Insert => "insert",
            ClientOperation::Command => "command",
            ClientOperation::Exec => "exec",
        }
    }
}

impl fmt::Display for ClientOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The first argument of a client call.
///
/// Query-shaped calls carry `query` (and optionally `query_id`); insert-shaped
/// calls additionally carry the target `table`. Every field is optional, and
/// an all-empty value stands in for an absent argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallParams {
    /// Raw SQL text of the call, if any.
    pub query: Option<String>,
    /// Caller-chosen query identifier.
    pub query_id: Option<String>,
    /// Explicit target table for insert calls.
    pub table: Option<String>,
}

impl CallParams {
    /// Parameters for a query-shaped call.
    pub fn query(sql: impl Into<String>) -> Self {
        Self {
            query: Some(sql.into()),
            ..Self::default()
        }
    }

    /// Parameters for an insert-shaped call targeting `table`.
    pub fn insert(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::default()
        }
    }

    /// Attach a caller-chosen query identifier.
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }
}

/// Connection state a client exposes to the instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Server endpoint the client talks to.
    pub url: Url,
    /// Database the client is bound to, when configured.
    pub database: Option<String>,
}

impl ConnectionParams {
    /// Connection parameters for the given endpoint.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            database: None,
        }
    }

    /// Set the database the client is bound to.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Completion record of a client call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResult {
    /// Identifier the server (or caller) assigned to the executed statement.
    pub query_id: Option<String>,
}

/// Error surface of the wrapped client library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request never reached the server or the connection dropped.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server rejected or failed the statement.
    #[error("server error: {0}")]
    Server(String),
    /// The call was malformed before any request was issued.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The client does not implement the requested method.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(ClientOperation),
}

/// Deferred completion of a client call.
pub type CallFuture = Pin<Box<dyn Future<Output = Result<CallResult, ClientError>> + Send>>;

/// What a client method hands back: either a result computed on the spot, or
/// a future that settles later.
///
/// The split matters to the instrumentation: synchronous outcomes are
/// finalized before the call returns, deferred ones through an attached
/// continuation.
pub enum CallOutcome {
    /// The call completed (or failed) before returning.
    Ready(Result<CallResult, ClientError>),
    /// The call is still in flight.
    Deferred(CallFuture),
}

impl CallOutcome {
    /// An outcome that completed synchronously.
    pub fn ready(result: Result<CallResult, ClientError>) -> Self {
        CallOutcome::Ready(result)
    }

    /// An outcome that settles when `future` does.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<CallResult, ClientError>> + Send + 'static,
    {
        CallOutcome::Deferred(Box::pin(future))
    }

    /// Wait for the call to settle, whichever arm it took.
    pub async fn resolve(self) -> Result<CallResult, ClientError> {
        match self {
            CallOutcome::Ready(result) => result,
            CallOutcome::Deferred(future) => future.await,
        }
    }
}

impl fmt::Debug for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutcome::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            CallOutcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A client method implementation.
///
/// Receives the client instance the call was made on and the call's
/// parameters, exactly as the caller supplied them.
pub type MethodHandler = Arc<dyn Fn(&Client, CallParams) -> CallOutcome + Send + Sync>;

/// The client type's method table.
#[derive(Default)]
pub struct MethodTable {
    entries: HashMap<ClientOperation, MethodHandler>,
}

impl MethodTable {
    /// An empty method table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` as the implementation of `operation`.
    pub fn with_handler<F>(mut self, operation: ClientOperation, handler: F) -> Self
    where
        F: Fn(&Client, CallParams) -> CallOutcome + Send + Sync + 'static,
    {
        self.entries.insert(operation, Arc::new(handler));
        self
    }

    /// Current implementation of `operation`, if the table has one.
    pub fn handler(&self, operation: ClientOperation) -> Option<&MethodHandler> {
        self.entries.get(&operation)
    }

    /// Replace the implementation of `operation`.
    pub fn set_handler(&mut self, operation: ClientOperation, handler: MethodHandler) {
        self.entries.insert(operation, handler);
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Shared handle to a client type's method table.
///
/// Every [`Client`] created from one [`ClientModule`] dispatches through the
/// same table, so swapping an entry here retargets all of them at once --
/// the systems-language equivalent of patching a prototype method.
#[derive(Debug, Clone)]
pub struct ClientMethods {
    table: Arc<RwLock<MethodTable>>,
}

impl ClientMethods {
    /// Wrap a method table in a shared handle.
    pub fn new(table: MethodTable) -> Self {
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Clone out the current implementation of `operation`.
    pub fn handler(&self, operation: ClientOperation) -> Option<MethodHandler> {
        self.table.read().handler(operation).cloned()
    }

    /// Replace the implementation of `operation` for all clients sharing
    /// this table.
    pub fn set_handler(&self, operation: ClientOperation, handler: MethodHandler) {
        self.table.write().set_handler(operation, handler);
    }
}

/// The loaded client module's exports, as seen by the instrumentation.
///
/// A well-formed module exposes the client type's method table; a module
/// missing that shape is left untouched by the instrumentation.
#[derive(Debug)]
pub struct ClientModule {
    methods: Option<ClientMethods>,
}

impl ClientModule {
    /// A module exposing a client type backed by `table`.
    pub fn new(table: MethodTable) -> Self {
        Self {
            methods: Some(ClientMethods::new(table)),
        }
    }

    /// A module that does not expose the expected client type.
    pub fn without_client() -> Self {
        Self { methods: None }
    }

    /// The client type's method table, when the module exposes one.
    pub fn client_methods(&self) -> Option<&ClientMethods> {
        self.methods.as_ref()
    }

    /// Create a client instance bound to this module's method table.
    pub fn client(&self, connection: Option<ConnectionParams>) -> Option<Client> {
        let methods = self.methods.clone()?;
        Some(Client {
            connection,
            methods,
        })
    }
}

/// A client instance.
///
/// Calls dispatch through the module's shared method table; the instance
/// itself only contributes its connection state.
#[derive(Debug, Clone)]
pub struct Client {
    connection: Option<ConnectionParams>,
    methods: ClientMethods,
}

impl Client {
    /// Connection state of this instance, when known.
    pub fn connection_params(&self) -> Option<&ConnectionParams> {
        self.connection.as_ref()
    }

    /// Run a SELECT-style statement.
    pub fn query(&self, params: CallParams) -> CallOutcome {
        self.call(ClientOperation::Query, params)
    }

    /// Stream rows into a table.
    pub fn insert(&self, params: CallParams) -> CallOutcome {
        self.call(ClientOperation::Insert, params)
    }

    /// Run a statement with no result set.
    pub fn command(&self, params: CallParams) -> CallOutcome {
        self.call(ClientOperation::Command, params)
    }

    /// Run a statement and expose its raw response.
    pub fn exec(&self, params: CallParams) -> CallOutcome {
        self.call(ClientOperation::Exec, params)
    }

    /// Dispatch `operation` through the shared method table.
    pub fn call(&self, operation: ClientOperation, params: CallParams) -> CallOutcome {
        match self.methods.handler(operation) {
            Some(handler) => handler(self, params),
            None => CallOutcome::ready(Err(ClientError::UnsupportedMethod(operation))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_table() -> MethodTable {
        MethodTable::new().with_handler(ClientOperation::Query, |_, params: CallParams| {
            CallOutcome::deferred(async move {
                Ok(CallResult {
                    query_id: params.query_id,
                })
            })
        })
    }

    #[test]
    fn test_params_shapes() {
        let query = CallParams::query("SELECT 1").with_query_id("q-1");
        assert_eq!(query.query.as_deref(), Some("SELECT 1"));
        assert_eq!(query.query_id.as_deref(), Some("q-1"));
        assert_eq!(query.table, None);

        let insert = CallParams::insert("events");
        assert_eq!(insert.table.as_deref(), Some("events"));
        assert_eq!(insert.query, None);
    }

    #[tokio::test]
    async fn test_dispatch_through_table() {
        let module = ClientModule::new(echo_table());
        let client = module.client(None).unwrap();

        let result = client
            .query(CallParams::query("SELECT 1").with_query_id("q-7"))
            .resolve()
            .await
            .unwrap();
        assert_eq!(result.query_id.as_deref(), Some("q-7"));
    }

    #[tokio::test]
    async fn test_missing_method_is_an_error() {
        let module = ClientModule::new(echo_table());
        let client = module.client(None).unwrap();

        let err = client
            .exec(CallParams::query("SELECT 1"))
            .resolve()
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::UnsupportedMethod(ClientOperation::Exec));
    }

    #[test]
    fn test_module_without_client() {
        let module = ClientModule::without_client();
        assert!(module.client_methods().is_none());
        assert!(module.client(None).is_none());
    }

    #[test]
    fn test_table_swap_is_shared_across_clients() {
        let module = ClientModule::new(echo_table());
        let methods = module.client_methods().unwrap().clone();
        let client = module.client(None).unwrap();

        methods.set_handler(
            ClientOperation::Query,
            Arc::new(|_, _| CallOutcome::ready(Ok(CallResult::default()))),
        );

        match client.query(CallParams::query("SELECT 1").with_query_id("q")) {
            CallOutcome::Ready(Ok(result)) => assert_eq!(result.query_id, None),
            other => panic!("expected swapped handler, got {other:?}"),
        }
    }
}
