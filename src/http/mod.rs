//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → middleware/metrics.rs (count, time, in-flight gauge)
//!     → handlers.rs (health, scrape, predict)
//!     → model slot (external predictor)
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer};
