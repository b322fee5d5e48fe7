//! HTTP server for the relay.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns 200 if the process is running

pub mod health;

pub use health::health_handler;

/// Builds the axum Router with all endpoints.
pub fn build_router() -> axum::Router {
    use axum::routing::get;

    axum::Router::new().route("/health", get(health_handler))
}
