//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use retention_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Helper to track HTTP request metrics (latency, count).
pub fn track_request(method: &str, path: &str, status: u16, latency_sec: f64) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(latency_sec);
}

/// Helper to track one retention run.
///
/// `outcome` is `success`, `partial` (some deletions failed or were skipped)
/// or `failed` (aborted before deleting).
pub fn track_retention_run(
    outcome: &'static str,
    deleted: usize,
    failed: usize,
    bytes_reclaimed: u64,
    duration_sec: f64,
) {
    metrics::counter!("retention_runs_total", "outcome" => outcome).increment(1);
    metrics::counter!("retention_objects_deleted_total").increment(deleted as u64);
    metrics::counter!("retention_delete_errors_total").increment(failed as u64);
    metrics::counter!("retention_bytes_reclaimed_total").increment(bytes_reclaimed);
    metrics::histogram!("retention_run_duration_seconds", "outcome" => outcome).record(duration_sec);
}
