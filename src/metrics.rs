//! Run metrics
//!
//! Counters and histograms are recorded through the `metrics` facade. They are
//! no-ops until [`init_metrics`] installs the Prometheus exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent; later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address of the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "records_enriched_total",
        Unit::Count,
        "Records fetched, extracted and written"
    );

    describe_counter!(
        "records_failed_total",
        Unit::Count,
        "Records left incomplete, labelled by failure kind"
    );

    describe_counter!(
        "fields_not_available_total",
        Unit::Count,
        "Schema fields not found on fetched pages"
    );

    describe_counter!(
        "batches_flushed_total",
        Unit::Count,
        "Batches written to disk"
    );

    describe_counter!(
        "flush_failures_total",
        Unit::Count,
        "Dataset flushes that failed"
    );

    describe_histogram!(
        "batch_duration_seconds",
        Unit::Seconds,
        "Fetch, extract and flush time of one batch"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Count an enriched record and its sentinel fields.
pub fn record_enriched(missing_fields: usize) {
    counter!("records_enriched_total").increment(1);
    if missing_fields > 0 {
        counter!("fields_not_available_total").increment(missing_fields as u64);
    }
}

/// Count a record left incomplete; `kind` is `fetch` or `extract`.
pub fn record_failed(kind: &'static str) {
    counter!("records_failed_total", "kind" => kind).increment(1);
}

/// Count a flushed batch and its duration.
pub fn record_batch_flushed(elapsed: Duration) {
    counter!("batches_flushed_total").increment(1);
    histogram!("batch_duration_seconds").record(elapsed.as_secs_f64());
}

/// Count a failed flush.
pub fn record_flush_failure() {
    counter!("flush_failures_total").increment(1);
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
