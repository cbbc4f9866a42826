//! `/health` endpoint.

use std::time::Instant;

use jamoveo_core::RehearsalState;
use jamoveo_session::Commit;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Admitted `WebSocket` connections.
    pub connections: usize,
    /// Whether a rehearsal is running.
    pub rehearsal_state: RehearsalState,
    /// Commits since startup.
    pub revision: u64,
}

/// Build a health response from live counters and the latest commit.
pub fn health_check(start_time: Instant, connections: usize, commit: &Commit) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        rehearsal_state: commit.state.rehearsal_state(),
        revision: commit.revision,
    }
}
