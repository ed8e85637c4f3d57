//! Core task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle status of a task.
///
/// Transitions only move forward: `initiated -> running -> completed | failed`.
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Initiated,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns the status name as used in the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Initiated => "initiated",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Whether the task will never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Initiated => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// Staying in the same status is always allowed; terminal statuses are frozen.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// All statuses, in lifecycle order.
    pub fn all() -> [TaskStatus; 4] {
        [
            TaskStatus::Initiated,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business-level outcome of a run, set once the task is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    Success,
    Failed,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Success => "SUCCESS",
            FinalStatus::Failed => "FAILED",
        }
    }
}

/// Pipeline stage a run has most recently entered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Scraping,
    Processing,
    Analysis,
    Finalize,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Scraping => "scraping",
            WorkflowStage::Processing => "processing",
            WorkflowStage::Analysis => "analysis",
            WorkflowStage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Validated parameters of one triggered run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowParameters {
    /// Listing pages to scrape, in order.
    pub page_numbers: Vec<u32>,
    /// Folder (relative to the configured download root) receiving downloads.
    pub download_folder: String,
    /// Write a per-run report file when the run finishes.
    pub save_results: bool,
}

impl Default for WorkflowParameters {
    fn default() -> Self {
        Self {
            page_numbers: vec![1],
            download_folder: "test_enhanced_metadata".to_string(),
            save_results: true,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Summary of the scraping stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapingSummary {
    pub pages_processed: usize,
    pub files_downloaded: usize,
    pub links_found: usize,
}

/// Summary of the text extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_files: usize,
}

/// Summary of the analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub documents_analyzed: usize,
    pub successful_analyses: usize,
    pub failed_analyses: usize,
}

/// Per-stage summaries, filled in as stages complete.
///
/// A missing summary means the stage was never reached (or produced nothing).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraping_summary: Option<ScrapingSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_summary: Option<ProcessingSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<AnalysisSummary>,
}

impl TaskResults {
    /// Fill in summaries present in `other`; existing summaries are never cleared.
    pub fn merge(&mut self, other: &TaskResults) {
        if other.scraping_summary.is_some() {
            self.scraping_summary = other.scraping_summary.clone();
        }
        if other.processing_summary.is_some() {
            self.processing_summary = other.processing_summary.clone();
        }
        if other.analysis_summary.is_some() {
            self.analysis_summary = other.analysis_summary.clone();
        }
    }

    /// Whether every summary set in `self` is still set in `next`.
    fn retained_by(&self, next: &TaskResults) -> bool {
        (self.scraping_summary.is_none() || next.scraping_summary.is_some())
            && (self.processing_summary.is_none() || next.processing_summary.is_some())
            && (self.analysis_summary.is_none() || next.analysis_summary.is_some())
    }
}

// ============================================================================
// Task
// ============================================================================

/// One triggered run of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier (UUID v4), immutable.
    pub id: String,
    pub status: TaskStatus,
    pub message: String,
    pub parameters: WorkflowParameters,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Correlates produced artifacts; assigned when the run starts executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<WorkflowStage>,
    /// Append-only list of human-readable errors.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub results: TaskResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_status: Option<FinalStatus>,
}

impl Task {
    /// Creates a fresh task in the `initiated` state.
    pub fn new(id: impl Into<String>, parameters: WorkflowParameters) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Initiated,
            message: "Workflow task initiated".to_string(),
            parameters,
            started_at: Utc::now(),
            completed_at: None,
            workflow_id: None,
            current_stage: None,
            errors: Vec::new(),
            results: TaskResults::default(),
            final_status: None,
        }
    }

    /// Seconds between start and completion, once terminal.
    pub fn duration_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|completed| (completed - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Checks that `next` is a legal successor of this record.
    ///
    /// Returns a description of the first violated rule.
    pub fn check_successor(&self, next: &Task) -> Result<(), String> {
        if next.id != self.id {
            return Err(format!("id changed from {} to {}", self.id, next.id));
        }
        if next.started_at != self.started_at {
            return Err("started_at is immutable".to_string());
        }
        if !self.status.can_transition_to(next.status) {
            return Err(format!(
                "status cannot move from {} to {}",
                self.status, next.status
            ));
        }
        if !next.errors.starts_with(&self.errors) {
            return Err("errors are append-only".to_string());
        }
        if !self.results.retained_by(&next.results) {
            return Err("stage summaries cannot be retracted".to_string());
        }
        if self.workflow_id.is_some() && next.workflow_id != self.workflow_id {
            return Err("workflow_id cannot change once assigned".to_string());
        }
        if self.final_status.is_some() && next.final_status != self.final_status {
            return Err("final_status cannot change once set".to_string());
        }
        if let Some(completed_at) = next.completed_at {
            if completed_at < next.started_at {
                return Err("completed_at precedes started_at".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("task-1", WorkflowParameters::default())
    }

    #[test]
    fn test_status_transitions() {
        use TaskStatus::*;
        assert!(Initiated.can_transition_to(Running));
        assert!(Initiated.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Running));
        assert!(!Running.can_transition_to(Initiated));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Initiated).unwrap(),
            "\"initiated\""
        );
        assert_eq!(
            serde_json::to_string(&FinalStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowStage::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn test_new_task_defaults() {
        let task = task();
        assert_eq!(task.status, TaskStatus::Initiated);
        assert!(task.completed_at.is_none());
        assert!(task.workflow_id.is_none());
        assert!(task.errors.is_empty());
        assert!(task.duration_secs().is_none());
    }

    #[test]
    fn test_results_serialization_omits_missing_summaries() {
        let results = TaskResults {
            scraping_summary: Some(ScrapingSummary {
                pages_processed: 1,
                files_downloaded: 0,
                links_found: 3,
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&results).unwrap();
        assert!(json.get("scraping_summary").is_some());
        assert!(json.get("processing_summary").is_none());
        assert!(json.get("analysis_summary").is_none());
    }

    #[test]
    fn test_results_merge_never_clears() {
        let mut results = TaskResults {
            scraping_summary: Some(ScrapingSummary {
                pages_processed: 2,
                files_downloaded: 4,
                links_found: 8,
            }),
            ..Default::default()
        };
        results.merge(&TaskResults {
            processing_summary: Some(ProcessingSummary {
                files_processed: 4,
                files_failed: 0,
                total_files: 4,
            }),
            ..Default::default()
        });
        assert!(results.scraping_summary.is_some());
        assert!(results.processing_summary.is_some());
    }

    #[test]
    fn test_check_successor_accepts_forward_progress() {
        let current = task();
        let mut next = current.clone();
        next.status = TaskStatus::Running;
        next.workflow_id = Some("workflow_x".to_string());
        next.errors.push("page 2 unavailable".to_string());
        assert!(current.check_successor(&next).is_ok());
    }

    #[test]
    fn test_check_successor_rejects_status_regression() {
        let mut current = task();
        current.status = TaskStatus::Running;
        let mut next = current.clone();
        next.status = TaskStatus::Initiated;
        assert!(current.check_successor(&next).is_err());
    }

    #[test]
    fn test_check_successor_rejects_error_removal() {
        let mut current = task();
        current.errors.push("first".to_string());
        let mut next = current.clone();
        next.errors.clear();
        assert!(current.check_successor(&next).is_err());
    }

    #[test]
    fn test_check_successor_rejects_summary_retraction() {
        let mut current = task();
        current.results.analysis_summary = Some(AnalysisSummary {
            documents_analyzed: 1,
            successful_analyses: 1,
            failed_analyses: 0,
        });
        let mut next = current.clone();
        next.results.analysis_summary = None;
        assert!(current.check_successor(&next).is_err());
    }

    #[test]
    fn test_check_successor_rejects_completion_before_start() {
        let current = task();
        let mut next = current.clone();
        next.status = TaskStatus::Completed;
        next.completed_at = Some(current.started_at - chrono::Duration::seconds(5));
        assert!(current.check_successor(&next).is_err());
    }

    #[test]
    fn test_duration_secs() {
        let mut task = task();
        task.completed_at = Some(task.started_at + chrono::Duration::milliseconds(2500));
        assert_eq!(task.duration_secs(), Some(2.5));
    }
}
