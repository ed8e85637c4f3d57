//! Mock analyzer for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::analyzer::{AnalysisReport, Analyzer, DocumentAnalysis, DocumentJudgment};
use crate::error::StageError;
use crate::extractor::ExtractedDocument;

/// Mock implementation of the Analyzer trait.
///
/// Every document gets the configured judgment unless its file name was
/// marked as failing.
#[derive(Debug, Clone)]
pub struct MockAnalyzer {
    judgment: Arc<RwLock<DocumentJudgment>>,
    failing_files: Arc<RwLock<HashSet<String>>>,
    error: Arc<RwLock<Option<String>>>,
    panic: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<Vec<String>>>>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            judgment: Arc::new(RwLock::new(super::fixtures::judgment())),
            failing_files: Arc::new(RwLock::new(HashSet::new())),
            error: Arc::new(RwLock::new(None)),
            panic: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_judgment(&self, judgment: DocumentJudgment) {
        *self.judgment.write().await = judgment;
    }

    /// Record an analysis error for documents with this file name.
    pub async fn fail_file(&self, file_name: impl Into<String>) {
        self.failing_files.write().await.insert(file_name.into());
    }

    pub async fn set_error(&self, message: impl Into<String>) {
        *self.error.write().await = Some(message.into());
    }

    pub async fn set_panic(&self, message: impl Into<String>) {
        *self.panic.write().await = Some(message.into());
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// File names of the documents received on each call.
    pub async fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, documents: &[ExtractedDocument]) -> Result<AnalysisReport, StageError> {
        self.calls
            .write()
            .await
            .push(documents.iter().map(|d| d.file_name.clone()).collect());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let panic = self.panic.read().await.clone();
        if let Some(message) = panic {
            panic!("{}", message);
        }

        if let Some(message) = self.error.read().await.clone() {
            return Err(StageError::Llm(message));
        }

        let judgment = self.judgment.read().await.clone();
        let failing = self.failing_files.read().await.clone();
        let results = documents
            .iter()
            .map(|doc| {
                if failing.contains(&doc.file_name) {
                    DocumentAnalysis::failure(doc, "mock analysis failure")
                } else {
                    DocumentAnalysis::success(doc, judgment.clone())
                }
            })
            .collect();

        Ok(AnalysisReport::new(results))
    }
}
