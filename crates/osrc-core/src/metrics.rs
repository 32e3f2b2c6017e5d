//! Prometheus metrics helpers for osrc.
//!
//! # Usage
//!
//! ```rust,ignore
//! use osrc_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let handle = init_metrics()?;
//!     start_metrics_server(9091, handle).await?;
//!
//!     metrics::counter!("ingest_events_total").increment(1);
//!     Ok(())
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`ingest_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: used sparingly (`kind` on enrichment counters only)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Install the Prometheus recorder and register metric descriptions.
///
/// Fails if a recorder is already installed for this process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_common_metrics();
    Ok(handle)
}

/// Start the Prometheus metrics HTTP server.
///
/// Binds `0.0.0.0:{port}` before returning, then serves `/metrics` from a
/// background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for the metrics emitted by the ingester.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Ingestion
    // =========================================================================

    describe_counter!("ingest_shards_total", "Shards fully processed and committed");
    describe_counter!("ingest_events_total", "Records read from shards");
    describe_counter!(
        "ingest_events_inserted_total",
        "New events persisted to the store"
    );
    describe_counter!(
        "ingest_events_duplicate_total",
        "Records skipped because the event id was already stored"
    );
    describe_counter!(
        "ingest_events_invalid_total",
        "Records rejected (malformed or entity resolution failure)"
    );
    describe_counter!(
        "ingest_enrichments_total",
        "Payload enrichment resolutions performed (label: kind)"
    );
    describe_counter!(
        "ingest_fetch_errors_total",
        "Failed shard fetch attempts (transport errors and error statuses)"
    );
    describe_counter!("ingest_bytes_total", "Decompressed shard bytes read");
    describe_histogram!(
        "ingest_shard_duration_seconds",
        "Wall time spent fetching, parsing and committing one shard"
    );
    describe_gauge!(
        "ingest_running",
        "Whether an ingestion run is in progress (1=yes, 0=no)"
    );
}
