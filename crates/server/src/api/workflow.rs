//! Workflow API handlers: trigger, status, list and clear.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use docket_core::{DispatchError, Task, TriggerReceipt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics::{TASKS_CLEARED_TOTAL, TASKS_TRIGGERED_TOTAL, TRIGGER_REJECTIONS_TOTAL};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Task record plus derived fields for status polling
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        let duration_secs = task.duration_secs();
        Self {
            task,
            duration_secs,
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub tasks: Vec<TaskResponse>,
}

/// Response for clearing terminal tasks
#[derive(Debug, Serialize)]
pub struct ClearTasksResponse {
    pub message: String,
    pub cleared: usize,
    pub remaining_tasks: usize,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct WorkflowErrorResponse {
    pub error: String,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
) -> (StatusCode, Json<WorkflowErrorResponse>) {
    (
        status,
        Json(WorkflowErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Validate parameters, register a task and start its run in the background.
///
/// An empty body means "all defaults".
pub async fn trigger_workflow(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TriggerReceipt>, impl IntoResponse> {
    let raw = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                TRIGGER_REJECTIONS_TOTAL
                    .with_label_values(&["invalid_json"])
                    .inc();
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid JSON body: {}", e),
                ));
            }
        }
    };

    match state.dispatcher().trigger(&raw) {
        Ok(receipt) => {
            TASKS_TRIGGERED_TOTAL.inc();
            info!(task_id = %receipt.task_id, "Workflow triggered");
            Ok(Json(receipt))
        }
        Err(DispatchError::Validation(e)) => {
            TRIGGER_REJECTIONS_TOTAL
                .with_label_values(&["validation"])
                .inc();
            warn!(error = %e, "Rejected workflow trigger");
            Err(error_response(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e @ DispatchError::Store(_)) => {
            TRIGGER_REJECTIONS_TOTAL
                .with_label_values(&["store"])
                .inc();
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ))
        }
    }
}

/// Get the current record of one task
pub async fn workflow_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, impl IntoResponse> {
    match state.store().get(&task_id) {
        Ok(Some(task)) => Ok(Json(TaskResponse::from(task))),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "Task not found")),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// List every task, oldest first
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListTasksResponse>, impl IntoResponse> {
    let tasks = match state.store().list() {
        Ok(tasks) => tasks,
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    Ok(Json(ListTasksResponse {
        message: format!("Found {} tasks", tasks.len()),
        timestamp: Utc::now(),
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
    }))
}

/// Remove completed and failed tasks; running ones stay
pub async fn clear_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearTasksResponse>, impl IntoResponse> {
    let store = state.store();

    let cleared = match store.clear_terminal() {
        Ok(cleared) => cleared,
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };
    let remaining_tasks = match store.len() {
        Ok(len) => len,
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    TASKS_CLEARED_TOTAL.inc_by(cleared as u64);
    info!(cleared, remaining_tasks, "Cleared terminal tasks");

    Ok(Json(ClearTasksResponse {
        message: format!("Cleared {} completed/failed tasks", cleared),
        cleared,
        remaining_tasks,
        timestamp: Utc::now(),
    }))
}
