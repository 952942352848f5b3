//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Keep the scrape path clear of the API routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - The log level is not checked here; unknown names fall back to INFO

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;
use crate::http::server::{HEALTH_PATH, PREDICT_PATH};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
    #[error("observability.metrics_path {0:?} must start with '/'")]
    RelativeMetricsPath(String),
    #[error("observability.metrics_path {0:?} collides with an API route")]
    MetricsPathConflict(String),
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let metrics_path = &config.observability.metrics_path;
    if !metrics_path.starts_with('/') {
        errors.push(ValidationError::RelativeMetricsPath(metrics_path.clone()));
    } else if metrics_path == HEALTH_PATH || metrics_path == PREDICT_PATH {
        errors.push(ValidationError::MetricsPathConflict(metrics_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
