//! Axum HTTP API server.
//!
//! This crate provides:
//! - Composition endpoints (mux, snapshot, concat) over local FFmpeg
//! - Detached story runs with persisted, pollable state
//! - Static serving of generated assets
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, RunRegistry};
