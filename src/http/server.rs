//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (timeout, request metrics, request ID, tracing)
//! - Serve the Prometheus scrape endpoint
//! - Bind server to listener and drain on shutdown
//! - Drive histogram upkeep while the server runs

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, ServiceConfig};
use crate::http::handlers;
use crate::http::middleware::{track_requests, RequestMetrics};
use crate::model::ModelSlot;
use crate::observability::metrics::MetricsRegistry;

pub const HEALTH_PATH: &str = "/health";
pub const PREDICT_PATH: &str = "/predict";

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// How often buffered histogram observations are folded into their buckets.
const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub metrics: MetricsRegistry,
    pub models: Arc<ModelSlot>,
}

/// HTTP server for the prediction API.
pub struct HttpServer {
    router: Router,
    metrics: MetricsRegistry,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The configuration is validated first, so a config assembled in code
    /// gets the same checks as one loaded from disk.
    pub fn new(
        config: ServiceConfig,
        metrics: MetricsRegistry,
        models: Arc<ModelSlot>,
    ) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let state = AppState {
            metrics: metrics.clone(),
            models,
        };
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            metrics,
            metrics_path: config.observability.metrics_path,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layer order, outermost first: trace, request id, request metrics,
    /// timeout. A timed-out request is therefore counted with its 408.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let observability = &config.observability;
        let request_metrics = RequestMetrics::new(
            state.metrics.clone(),
            &observability.metrics_path,
            observability.endpoint_label,
        );

        Router::new()
            .route(HEALTH_PATH, get(handlers::health))
            .route(PREDICT_PATH, post(handlers::predict))
            .route(&observability.metrics_path, get(handlers::metrics))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(request_metrics, track_requests))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// A clone of the fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            metrics_path = %self.metrics_path,
            "HTTP server starting"
        );

        let upkeep = tokio::spawn(run_metrics_upkeep(self.metrics, METRICS_UPKEEP_INTERVAL));

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        upkeep.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Periodically drain buffered histogram observations so they do not pile up
/// between scrapes. Runs until the task is aborted.
async fn run_metrics_upkeep(metrics: MetricsRegistry, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        metrics.run_upkeep();
    }
}
