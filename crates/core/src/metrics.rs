//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Workflow runs (started, finished, in flight)
//! - Pipeline stages (duration, items processed)
//! - External services (listing site, extractor commands, LLM)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Workflow Run Metrics
// =============================================================================

/// Workflow runs started total.
pub static RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("docket_runs_started_total", "Total workflow runs started").unwrap()
});

/// Workflow runs finished total by lifecycle status and business outcome.
pub static RUNS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docket_runs_finished_total", "Total workflow runs finished"),
        // status: "completed", "failed"; final_status: "SUCCESS", "FAILED"
        &["status", "final_status"],
    )
    .unwrap()
});

/// Workflow runs currently executing.
pub static ACTIVE_RUNS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("docket_active_runs", "Workflow runs currently executing").unwrap()
});

/// Whole-run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("docket_run_duration_seconds", "Duration of workflow runs")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["final_status"],
    )
    .unwrap()
});

/// Decision point short-circuits by stage.
pub static SHORT_CIRCUITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "docket_short_circuits_total",
            "Runs that skipped to finalize at a decision point",
        ),
        &["stage"], // "scraping", "processing"
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("docket_stage_duration_seconds", "Duration of pipeline stages")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["stage"],
    )
    .unwrap()
});

/// Items handled by each stage.
pub static STAGE_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docket_stage_items_total", "Items handled by pipeline stages"),
        &["stage", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Stage collaborator errors.
pub static STAGE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "docket_stage_errors_total",
            "Errors reported by stage collaborators",
        ),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "docket_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "docket_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docket_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the outcome and duration of one external call.
pub fn observe_external_call(service: &str, operation: &str, success: bool, seconds: f64) {
    let status = if success { "success" } else { "error" };
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, status])
        .inc();
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(seconds);
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Runs
        Box::new(RUNS_STARTED.clone()),
        Box::new(RUNS_FINISHED.clone()),
        Box::new(ACTIVE_RUNS.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(SHORT_CIRCUITS.clone()),
        // Stages
        Box::new(STAGE_DURATION.clone()),
        Box::new(STAGE_ITEMS.clone()),
        Box::new(STAGE_ERRORS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
        Box::new(LLM_TOKENS.clone()),
    ]
}
