//! Document classification collaborator.

mod llm;
mod llm_analyzer;
mod prompt;

pub use llm::{
    client_from_config, AnthropicClient, CompletionRequest, CompletionResponse, LlmClient,
    LlmError, LlmUsage, OllamaClient,
};
pub use llm_analyzer::LlmAnalyzer;
pub use prompt::{build_analysis_prompt, parse_json_response};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::extractor::ExtractedDocument;

/// Structured classification of one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentJudgment {
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub intermediary: Vec<String>,
    #[serde(default)]
    pub key_clauses: Vec<String>,
    #[serde(default)]
    pub key_metrics: Vec<String>,
    #[serde(default)]
    pub actionable_items: Vec<String>,
}

/// Analysis outcome for one document: a judgment or an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentAnalysis {
    pub file_name: String,
    pub content_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<DocumentJudgment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentAnalysis {
    pub fn success(doc: &ExtractedDocument, judgment: DocumentJudgment) -> Self {
        Self {
            file_name: doc.file_name.clone(),
            content_length: doc.char_count,
            judgment: Some(judgment),
            error: None,
        }
    }

    pub fn failure(doc: &ExtractedDocument, error: impl Into<String>) -> Self {
        Self {
            file_name: doc.file_name.clone(),
            content_length: doc.char_count,
            judgment: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of an analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisReport {
    pub analyzed_at: DateTime<Utc>,
    pub documents: Vec<DocumentAnalysis>,
}

impl AnalysisReport {
    pub fn new(documents: Vec<DocumentAnalysis>) -> Self {
        Self {
            analyzed_at: Utc::now(),
            documents,
        }
    }

    pub fn successful(&self) -> usize {
        self.documents.iter().filter(|d| d.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.successful()
    }
}

/// Analyzer collaborator used by the analysis stage.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &str;

    /// Classify each document; per-document failures are recorded in the report.
    async fn analyze(&self, documents: &[ExtractedDocument]) -> Result<AnalysisReport, StageError>;
}
