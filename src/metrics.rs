use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};
use std::time::Instant;

use crate::{DatasourceError, Result};

lazy_static! {
    // Query metrics
    pub static ref QUERY_COUNTER: IntCounter = register_int_counter!(
        "datasource_queries_total",
        "Total number of query requests received"
    ).unwrap();

    pub static ref TARGET_COUNTER: IntCounter = register_int_counter!(
        "datasource_targets_total",
        "Total number of query targets resolved"
    ).unwrap();

    pub static ref SERIES_COUNTER: IntCounter = register_int_counter!(
        "datasource_series_total",
        "Total number of series returned to the host"
    ).unwrap();

    // Backend metrics
    pub static ref BACKEND_REQUESTS: IntCounter = register_int_counter!(
        "datasource_backend_requests_total",
        "Total number of requests sent to the metrics backend"
    ).unwrap();

    pub static ref BACKEND_FAILURES: IntCounter = register_int_counter!(
        "datasource_backend_failures_total",
        "Total number of failed backend requests"
    ).unwrap();

    pub static ref BACKEND_DURATION: Histogram = register_histogram!(
        "datasource_backend_request_duration_seconds",
        "Backend request duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
    ).unwrap();
}

/// Touches every metric so they show up in the exposition before first use.
pub fn init_metrics() {
    lazy_static::initialize(&QUERY_COUNTER);
    lazy_static::initialize(&TARGET_COUNTER);
    lazy_static::initialize(&SERIES_COUNTER);
    lazy_static::initialize(&BACKEND_REQUESTS);
    lazy_static::initialize(&BACKEND_FAILURES);
    lazy_static::initialize(&BACKEND_DURATION);
}

/// Times one backend round-trip; the duration is recorded when dropped.
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn new() -> Self {
        BACKEND_REQUESTS.inc();
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        BACKEND_DURATION.observe(self.start.elapsed().as_secs_f64());
    }
}

pub fn record_query(targets: usize) {
    QUERY_COUNTER.inc();
    TARGET_COUNTER.inc_by(targets as u64);
}

pub fn record_backend_failure() {
    BACKEND_FAILURES.inc();
}

pub fn record_series(count: usize) {
    SERIES_COUNTER.inc_by(count as u64);
}

/// Renders the default registry in the Prometheus text format.
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| DatasourceError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| DatasourceError::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}
