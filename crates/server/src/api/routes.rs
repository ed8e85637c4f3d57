use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{artifacts, handlers, middleware::metrics_middleware, workflow};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Service info
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/config", get(handlers::get_config))
        // Workflow
        .route("/api/trigger-workflow", post(workflow::trigger_workflow))
        .route("/api/workflow-status/{task_id}", get(workflow::workflow_status))
        .route("/api/list-tasks", get(workflow::list_tasks))
        .route("/api/clear-tasks", delete(workflow::clear_tasks))
        // Artifacts
        .route("/api/scraping-metadata", get(artifacts::scraping_metadata))
        .route("/api/analysis-results", get(artifacts::analysis_results))
        .route(
            "/api/download-scraping-metadata",
            get(artifacts::download_scraping_metadata),
        )
        .route(
            "/api/download-analysis-results",
            get(artifacts::download_analysis_results),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
