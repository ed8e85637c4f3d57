pub mod analyzer;
pub mod artifact;
pub mod config;
pub mod error;
pub mod extractor;
pub mod metrics;
pub mod scraper;
pub mod task;
pub mod testing;
pub mod workflow;

pub use analyzer::{
    client_from_config, AnalysisReport, Analyzer, DocumentAnalysis, DocumentJudgment, LlmAnalyzer,
    LlmClient,
};
pub use artifact::{ArtifactError, ArtifactKind, ArtifactStore, RawArtifact, StoredArtifact};
pub use config::{load_config, validate_config, Config, ConfigError, SanitizedConfig};
pub use error::StageError;
pub use extractor::{CommandExtractor, ExtractedDocument, ExtractionReport, Extractor};
pub use scraper::{HttpScraper, ScrapeReport, ScrapeRequest, Scraper};
pub use task::{
    FinalStatus, InMemoryTaskStore, Task, TaskError, TaskResults, TaskStatus, TaskStore,
    WorkflowParameters, WorkflowStage,
};
pub use workflow::{Dispatcher, DispatchError, TriggerReceipt, ValidationError, WorkflowRunner};
