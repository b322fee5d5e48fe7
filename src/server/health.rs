//! Liveness probe.

use axum::http::StatusCode;

/// Answers `200 OK` with body `OK` while the process is up.
///
/// Says nothing about feed or sink reachability; those failures are retried
/// internally and only show up in the logs.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
