//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP interceptor, model slot, handlers produce:
//!     → metrics.rs (counters, gauges, histograms in one MetricsRegistry)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → Metrics endpoint (Prometheus scrape)
//!     → Log aggregation (stderr, plain or JSON lines)
//! ```
//!
//! # Design Decisions
//! - The registry is constructed by the process root and injected, never global
//! - Metrics are cheap (atomic increments)
//! - Logging is configured once and can be reconfigured without duplicate output

pub mod logging;
pub mod metrics;

pub use logging::{configure_logging, LogFormat, LogLevel, LoggingError};
pub use metrics::{MetricsError, MetricsRegistry};
