//! Task registry for tracking triggered workflow runs.

mod memory_store;
mod store;
mod types;

pub use memory_store::InMemoryTaskStore;
pub use store::{TaskError, TaskMutator, TaskStore};
pub use types::{
    AnalysisSummary, FinalStatus, ProcessingSummary, ScrapingSummary, Task, TaskResults,
    TaskStatus, WorkflowParameters, WorkflowStage,
};
