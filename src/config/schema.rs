//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the prediction service and training launcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Training launcher settings.
    pub launcher: LauncherConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// How the `endpoint` label of the HTTP series is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointLabel {
    /// Route template (`/items/{id}`); unmatched requests share one label.
    #[default]
    RoutePattern,
    /// Raw request path. Unbounded when paths carry parameters.
    RawPath,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    pub log_level: String,

    /// Emit one JSON object per log line.
    pub json_logs: bool,

    /// Path of the Prometheus scrape endpoint.
    pub metrics_path: String,

    /// Endpoint label policy for request metrics.
    pub endpoint_label: EndpointLabel,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            json_logs: false,
            metrics_path: "/metrics".to_string(),
            endpoint_label: EndpointLabel::default(),
        }
    }
}

/// Training launcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Python interpreter used for the MLflow check and the training run.
    pub python: String,

    /// Processed dataset that must exist before training.
    pub data_path: String,

    /// Training script passed to the interpreter.
    pub train_script: String,

    /// Port suggested for the MLflow UI once training finishes.
    pub mlflow_ui_port: u16,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            data_path: "data/processed/heart_disease_processed.csv".to_string(),
            train_script: "src/models/train_with_mlflow.py".to_string(),
            mlflow_ui_port: 5000,
        }
    }
}
