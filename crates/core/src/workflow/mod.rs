//! Workflow orchestration: the pipeline state machine and its dispatcher.

mod dispatcher;
mod report;
mod runner;
mod types;

pub use dispatcher::Dispatcher;
pub use report::{AnalysisMetadata, AnalysisResults, ScrapingMetadata, WorkflowReport};
pub use runner::{workflow_id_for, WorkflowRunner, NO_FILES_DOWNLOADED, NO_TEXT_EXTRACTED};
pub use types::{
    DispatchError, RunContext, StageOutcome, TriggerReceipt, ValidationError, WorkflowError,
};
