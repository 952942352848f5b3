//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the prediction service series (request totals, latency, predictions)
//! - Record domain events raised by the model layer
//! - Render the Prometheus text exposition for the scrape endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, endpoint, status_code
//! - `http_request_duration_seconds` (histogram): latency by method, endpoint
//! - `predictions_total` (counter): predictions by prediction_label
//! - `prediction_probability` (histogram): decile buckets by prediction_label
//! - `model_loaded` (gauge): 1=loaded, 0=not loaded
//! - `active_requests` (gauge): requests currently inside the handler chain
//!
//! # Design Decisions
//! - The recorder is never installed globally; every `MetricsRegistry` owns its
//!   own `PrometheusRecorder`, so tests get isolated registries
//! - Updates are routed through `metrics::with_local_recorder` and stay atomic
//! - Label sets are fixed per series; callers pass bounded label values
//! - Histogram observations are buffered until drained; the owner of the
//!   registry must call [`MetricsRegistry::run_upkeep`] periodically

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const PREDICTIONS_TOTAL: &str = "predictions_total";
pub const PREDICTION_PROBABILITY: &str = "prediction_probability";
pub const MODEL_LOADED: &str = "model_loaded";
pub const ACTIVE_REQUESTS: &str = "active_requests";

/// Content type of the text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Latency buckets, matching the Prometheus client library defaults.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

const PROBABILITY_BUCKETS: &[f64] = &[0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("invalid histogram buckets for {metric}: {source}")]
    Buckets {
        metric: &'static str,
        #[source]
        source: BuildError,
    },
}

/// Process-wide metric state, constructed once at startup and cloned into
/// every component that records.
#[derive(Clone)]
pub struct MetricsRegistry {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

impl MetricsRegistry {
    /// Build a fresh registry with every series declared.
    pub fn new() -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
                DURATION_BUCKETS,
            )
            .map_err(|source| MetricsError::Buckets {
                metric: HTTP_REQUEST_DURATION_SECONDS,
                source,
            })?
            .set_buckets_for_metric(
                Matcher::Full(PREDICTION_PROBABILITY.to_string()),
                PROBABILITY_BUCKETS,
            )
            .map_err(|source| MetricsError::Buckets {
                metric: PREDICTION_PROBABILITY,
                source,
            })?
            .build_recorder();

        let handle = recorder.handle();
        let registry = Self {
            recorder: Arc::new(recorder),
            handle,
        };
        registry.describe();
        Ok(registry)
    }

    fn with<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(self.recorder.as_ref(), f)
    }

    fn describe(&self) {
        self.with(|| {
            describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
            describe_histogram!(
                HTTP_REQUEST_DURATION_SECONDS,
                Unit::Seconds,
                "HTTP request duration in seconds"
            );
            describe_counter!(PREDICTIONS_TOTAL, "Total predictions made");
            describe_histogram!(PREDICTION_PROBABILITY, "Prediction probability distribution");
            describe_gauge!(MODEL_LOADED, "Model load status (1=loaded, 0=not loaded)");
            describe_gauge!(ACTIVE_REQUESTS, "Number of active requests being processed");

            // Unlabelled gauges exist from startup.
            gauge!(MODEL_LOADED).set(0.0);
            gauge!(ACTIVE_REQUESTS).set(0.0);
        });
    }

    /// Mark one more request as in flight.
    pub fn request_started(&self) {
        self.with(|| gauge!(ACTIVE_REQUESTS).increment(1.0));
    }

    /// Release an in-flight slot taken by [`request_started`](Self::request_started).
    pub fn request_finished(&self) {
        self.with(|| gauge!(ACTIVE_REQUESTS).decrement(1.0));
    }

    /// Count a completed request and record its latency.
    pub fn record_request(&self, method: &str, endpoint: &str, status_code: u16, duration: Duration) {
        self.with(|| {
            counter!(
                HTTP_REQUESTS_TOTAL,
                "method" => method.to_owned(),
                "endpoint" => endpoint.to_owned(),
                "status_code" => status_code.to_string()
            )
            .increment(1);
            histogram!(
                HTTP_REQUEST_DURATION_SECONDS,
                "method" => method.to_owned(),
                "endpoint" => endpoint.to_owned()
            )
            .record(duration.as_secs_f64());
        });
    }

    /// Record one prediction outcome.
    ///
    /// `probability` is recorded as given; out-of-range values land in the
    /// lowest or the overflow bucket.
    pub fn record_prediction(&self, label: &str, probability: f64) {
        self.with(|| {
            counter!(PREDICTIONS_TOTAL, "prediction_label" => label.to_owned()).increment(1);
            histogram!(PREDICTION_PROBABILITY, "prediction_label" => label.to_owned())
                .record(probability);
        });
    }

    /// Set the model availability gauge. Last write wins.
    pub fn update_model_status(&self, loaded: bool) {
        let value = if loaded { 1.0 } else { 0.0 };
        self.with(|| gauge!(MODEL_LOADED).set(value));
    }

    /// Fold buffered histogram observations into their buckets.
    ///
    /// `render` does this as well, but a server that is never scraped relies
    /// on this call to keep the buffers bounded.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Render all series in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Read back the current value of a single series.
    ///
    /// `labels` must match the series' label set exactly, in any order. For
    /// histograms pass the `_bucket`, `_sum` or `_count` name.
    pub fn sample(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let wanted: HashMap<&str, &str> = labels.iter().copied().collect();
        self.render().lines().find_map(|line| {
            let (series, value) = parse_sample_line(line)?;
            if series.name != name || series.labels.len() != wanted.len() {
                return None;
            }
            let matches = series
                .labels
                .iter()
                .all(|(k, v)| wanted.get(k.as_str()) == Some(&v.as_str()));
            matches.then_some(value)
        })
    }
}

struct Series {
    name: String,
    labels: Vec<(String, String)>,
}

fn parse_sample_line(line: &str) -> Option<(Series, f64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (series, value) = line.rsplit_once(' ')?;
    let value = match value {
        "+Inf" => f64::INFINITY,
        "-Inf" => f64::NEG_INFINITY,
        v => v.parse().ok()?,
    };

    let Some((name, rest)) = series.split_once('{') else {
        return Some((
            Series {
                name: series.to_string(),
                labels: Vec::new(),
            },
            value,
        ));
    };
    let body = rest.strip_suffix('}')?;
    Some((
        Series {
            name: name.to_string(),
            labels: parse_labels(body)?,
        },
        value,
    ))
}

fn parse_labels(body: &str) -> Option<Vec<(String, String)>> {
    let mut labels = Vec::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.peek() == Some(&',') {
            chars.next();
        }
        if chars.peek().is_none() {
            return Some(labels);
        }
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if chars.next() != Some('"') {
            return None;
        }
        let mut value = String::new();
        loop {
            match chars.next()? {
                '"' => break,
                '\\' => match chars.next()? {
                    'n' => value.push('\n'),
                    other => value.push(other),
                },
                c => value.push(c),
            }
        }
        labels.push((key, value));
    }
}
