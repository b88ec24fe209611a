//! Distributed tracing configuration.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use retention_core::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Filter used when `RUST_LOG` is unset: debug for the service and its
/// crates, info for dependencies.
pub const DEFAULT_LOG_FILTER: &str =
    "info,backup_retention=debug,retention_engine=debug,retention_store=debug,retention_admin=debug";

/// Configure tracing with stdout logging and, when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set, OpenTelemetry export.
///
/// `json` switches the stdout formatter to JSON lines.
pub fn configure_tracing(json: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    );

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint.clone()),
            )
            .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "backup-retention"),
            ])))
            .install_batch(runtime::Tokio)
            .map_err(|e| Error::configuration(format!("Failed to install OTLP pipeline: {}", e)))?;

        let tracer = provider.tracer("backup-retention");
        opentelemetry::global::set_tracer_provider(provider);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to install subscriber: {}", e)))?;
        tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing enabled");
    } else {
        registry
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to install subscriber: {}", e)))?;
    }

    Ok(())
}
