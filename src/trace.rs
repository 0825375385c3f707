//! Tracing setup. Check the docs for [`init_tracing`].

use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    resource::{SERVICE_NAME, SERVICE_VERSION},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn resource() -> Resource {
    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            ],
            SCHEMA_URL,
        )
        .build()
}

/// Install a global tracing subscriber that logs JSON to stdout and exports
/// spans over OTLP/HTTP to the collector named by the standard
/// `OTEL_EXPORTER_OTLP_*` environment variables (default
/// `http://localhost:4318`).
///
/// Filtering follows `RUST_LOG`, defaulting to `info`.
///
/// The returned provider must be kept alive, and should be shut down before
/// the program exits so that buffered spans are flushed. Spans are only
/// exported once they close, so keep each [`Batch`] span short-lived.
///
/// [`Batch`]: crate::Batch
///
/// # Panics
///
/// If the exporter cannot be built, or a global subscriber is already set.
pub fn init_tracing() -> SdkTracerProvider {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .build()
        .expect("failed to build OTLP span exporter");

    let provider = SdkTracerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build();
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    provider
}
