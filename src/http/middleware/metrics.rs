//! Request instrumentation middleware.
//!
//! Wraps every request/response cycle except the scrape endpoint, counting
//! requests by (method, endpoint, status_code) and timing them by
//! (method, endpoint). Responses pass through untouched.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;

use crate::config::EndpointLabel;
use crate::observability::metrics::MetricsRegistry;

/// Status recorded for a handler that panicked.
const STATUS_HANDLER_FAILED: u16 = 500;
/// Status recorded when the request future is dropped before the handler
/// produced a response (nginx's "client closed request").
const STATUS_CANCELLED: u16 = 499;

/// Label used under [`EndpointLabel::RoutePattern`] when no route matched.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_TRACE_HOOK: Once = Once::new();

/// Chain a panic hook that keeps the panicking thread's backtrace, so the
/// failure log can carry it. The previous hook still runs.
fn install_panic_trace_hook() {
    PANIC_TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

/// Message and stack trace of the panic just caught on this thread.
fn panic_exception(payload: &(dyn Any + Send)) -> String {
    let message = panic_message(payload);
    match PANIC_TRACE.with(|slot| slot.borrow_mut().take()) {
        Some(trace) => format!("{message}\n{trace}"),
        None => message,
    }
}

/// State handed to [`track_requests`].
#[derive(Clone, Debug)]
pub struct RequestMetrics {
    registry: MetricsRegistry,
    scrape_path: Arc<str>,
    endpoint_label: EndpointLabel,
}

impl RequestMetrics {
    pub fn new(registry: MetricsRegistry, scrape_path: &str, endpoint_label: EndpointLabel) -> Self {
        install_panic_trace_hook();
        Self {
            registry,
            scrape_path: Arc::from(scrape_path),
            endpoint_label,
        }
    }

    fn endpoint(&self, request: &Request) -> String {
        match self.endpoint_label {
            EndpointLabel::RawPath => request.uri().path().to_string(),
            EndpointLabel::RoutePattern => request
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str().to_string())
                .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string()),
        }
    }
}

/// Middleware function recording request count, latency and in-flight gauge.
///
/// A panic in the downstream handler is logged with its stack trace, recorded
/// as a 500 and then resumed unchanged.
pub async fn track_requests(
    State(state): State<RequestMetrics>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == &*state.scrape_path {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let endpoint = state.endpoint(&request);

    let mut in_flight = InFlightRequest::begin(&state.registry, method, endpoint);
    let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;

    match outcome {
        Ok(response) => {
            in_flight.complete(response.status().as_u16());
            response
        }
        Err(payload) => {
            let exception = panic_exception(payload.as_ref());
            tracing::error!(
                exception = %exception,
                "Request failed: {} {}",
                in_flight.method,
                in_flight.endpoint
            );
            in_flight.complete(STATUS_HANDLER_FAILED);
            drop(in_flight);
            panic::resume_unwind(payload)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// RAII guard for one instrumented request.
///
/// Holds an `active_requests` slot from creation; dropping it releases the
/// slot and records the request, whatever the exit path.
struct InFlightRequest<'a> {
    registry: &'a MetricsRegistry,
    method: String,
    endpoint: String,
    started: Instant,
    status: Option<u16>,
}

impl<'a> InFlightRequest<'a> {
    fn begin(registry: &'a MetricsRegistry, method: String, endpoint: String) -> Self {
        registry.request_started();
        Self {
            registry,
            method,
            endpoint,
            started: Instant::now(),
            status: None,
        }
    }

    fn complete(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for InFlightRequest<'_> {
    fn drop(&mut self) {
        let duration = self.started.elapsed();
        self.registry.request_finished();

        let status = match self.status {
            Some(status) => status,
            None => {
                tracing::warn!(
                    "Request cancelled before completion: {} {}",
                    self.method,
                    self.endpoint
                );
                STATUS_CANCELLED
            }
        };

        self.registry
            .record_request(&self.method, &self.endpoint, status, duration);

        tracing::info!(
            "{} {} - Status: {} - Duration: {:.4}s",
            self.method,
            self.endpoint,
            status,
            duration.as_secs_f64()
        );
    }
}
