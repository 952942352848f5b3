//! HTTP middleware.
//!
//! Applied with `axum::middleware::from_fn_with_state` around the API routes.

pub mod metrics;

pub use metrics::{track_requests, RequestMetrics};
