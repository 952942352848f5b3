//! Heart Disease Prediction MLOps service library.

pub mod config;
pub mod http;
pub mod launcher;
pub mod lifecycle;
pub mod model;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use model::{ModelSlot, Predictor};
pub use observability::MetricsRegistry;
