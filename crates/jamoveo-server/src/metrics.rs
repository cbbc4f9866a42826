//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before anything records. A second install fails.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Names recorded by the transport. The session core records its own
// (`ws_connections_*`, `session_*`).

/// Upgrade attempts refused before admission (counter, labels: reason).
pub const WS_UPGRADES_REJECTED_TOTAL: &str = "ws_upgrades_rejected_total";
/// Inbound text frames forwarded to the session (counter).
pub const WS_FRAMES_RECEIVED_TOTAL: &str = "ws_frames_received_total";
/// Inbound frames dropped as non-UTF-8 binary (counter).
pub const WS_FRAMES_IGNORED_TOTAL: &str = "ws_frames_ignored_total";
/// Lifetime of a `WebSocket` session (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Catalog HTTP requests (counter, labels: route, outcome).
pub const CATALOG_REQUESTS_TOTAL: &str = "catalog_requests_total";
