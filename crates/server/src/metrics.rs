//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the docket server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Task registry metrics (triggered, cleared, by status)
//! - Workflow and external service metrics from the core crate

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;

use docket_core::TaskStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "docket_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docket_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "docket_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics
// =============================================================================

/// Tasks by current status (collected dynamically).
pub static TASKS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("docket_tasks_by_status", "Current task count by status"),
        &["status"],
    )
    .unwrap()
});

/// Workflows accepted through the trigger endpoint.
pub static TASKS_TRIGGERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "docket_tasks_triggered_total",
        "Total workflows triggered since startup",
    )
    .unwrap()
});

/// Trigger requests rejected before a task was created.
pub static TRIGGER_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "docket_trigger_rejections_total",
            "Trigger requests rejected before a task was created",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Terminal tasks removed by clear-tasks.
pub static TASKS_CLEARED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "docket_tasks_cleared_total",
        "Total terminal tasks removed since startup",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Tasks
    registry
        .register(Box::new(TASKS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(TASKS_TRIGGERED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TRIGGER_REJECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TASKS_CLEARED_TOTAL.clone()))
        .unwrap();

    // Core metrics (workflow runs, stages, external services)
    for metric in docket_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the status gauges reflect the registry as it is
/// right now.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let store = state.store();
    for status in TaskStatus::all() {
        if let Ok(count) = store.count_by_status(status) {
            TASKS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count as i64);
        }
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Any other path under `/api/workflow-status/` also collapses to `{id}` so
/// probing unknown ids cannot blow up label cardinality.
pub fn normalize_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api/workflow-status/") {
        if !rest.is_empty() {
            return "/api/workflow-status/{id}".to_string();
        }
    }

    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
