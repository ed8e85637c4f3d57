//! Types for the workflow runner and dispatcher.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::analyzer::AnalysisReport;
use crate::extractor::ExtractionReport;
use crate::scraper::ScrapeReport;
use crate::task::{Task, TaskError, TaskResults, TaskStatus, WorkflowParameters};

/// Errors that abort a run from inside the orchestration itself.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Task not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Task store error.
    #[error("task store error: {0}")]
    TaskStore(#[from] TaskError),
}

/// Rejected trigger parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors returned synchronously by `Dispatcher::trigger`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to trigger workflow: {0}")]
    Store(#[from] TaskError),
}

/// Result of a stage that ends at a decision point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    /// Proceed to the next stage with this input.
    Continue(T),
    /// Skip straight to finalize; the reason is recorded as an error.
    ShortCircuit(String),
}

/// What a successful trigger hands back to the caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TriggerReceipt {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
}

impl From<&Task> for TriggerReceipt {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status,
            message: "Workflow has been initiated and is running in the background".to_string(),
            started_at: task.started_at,
        }
    }
}

/// State owned by one run and threaded through its stages.
///
/// Only the run that created it ever touches it; the task record is updated
/// from it through the store.
#[derive(Debug)]
pub struct RunContext {
    pub task_id: String,
    pub workflow_id: String,
    pub parameters: WorkflowParameters,
    pub download_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub errors: Vec<String>,
    pub results: TaskResults,
    pub scrape: Option<ScrapeReport>,
    pub extraction: Option<ExtractionReport>,
    pub analysis: Option<AnalysisReport>,
    pub reached_analysis: bool,
    pub short_circuit: Option<String>,
}

impl RunContext {
    pub fn new(task: &Task, workflow_id: impl Into<String>, download_dir: PathBuf) -> Self {
        Self {
            task_id: task.id.clone(),
            workflow_id: workflow_id.into(),
            parameters: task.parameters.clone(),
            download_dir,
            started_at: task.started_at,
            errors: task.errors.clone(),
            results: task.results.clone(),
            scrape: None,
            extraction: None,
            analysis: None,
            reached_analysis: false,
            short_circuit: None,
        }
    }

    /// Record a decision point short-circuit.
    pub fn short_circuit(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.errors.push(reason.clone());
        self.short_circuit = Some(reason);
    }
}
