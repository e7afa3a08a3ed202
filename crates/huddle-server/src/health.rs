//! `/health` endpoint.

use std::time::Instant;

use huddle_core::Phase;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live event streams.
    pub connections: usize,
    /// Current poll phase.
    pub phase: Phase,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, phase: Phase) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        phase,
    }
}
