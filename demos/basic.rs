//! Instrument a stub client module and print the spans it produces.
//!
//! Run with: cargo run --example basic

use clickhouse_tracing::{
    CallOutcome, CallParams, CallResult, ClickhouseInstrumentation, ClientModule, ClientOperation,
    ConnectionParams, InstrumentationConfig, MethodTable,
};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use url::Url;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let tracer = provider.tracer("basic-demo");

    let instrumentation =
        ClickhouseInstrumentation::with_tracer(tracer, InstrumentationConfig::default());

    // A stand-in for the real client module: every method just echoes the
    // caller's query id back.
    let mut table = MethodTable::new();
    for operation in ClientOperation::ALL {
        table = table.with_handler(operation, |_, params: CallParams| {
            CallOutcome::deferred(async move {
                Ok(CallResult {
                    query_id: params.query_id,
                })
            })
        });
    }
    let module = ClientModule::new(table);
    instrumentation.enable(&module);

    let connection =
        ConnectionParams::new(Url::parse("https://ch.local:8443").unwrap()).with_database("default");
    let client = module.client(Some(connection)).unwrap();

    client
        .query(CallParams::query("SELECT number FROM system.numbers LIMIT 10"))
        .resolve()
        .await
        .unwrap();
    client
        .insert(CallParams::insert("events").with_query_id("demo-insert"))
        .resolve()
        .await
        .unwrap();

    for span in exporter.get_finished_spans().unwrap() {
        println!("{} [{:?}]", span.name, span.status);
        for attribute in &span.attributes {
            println!("  {} = {:?}", attribute.key, attribute.value);
        }
    }
}
