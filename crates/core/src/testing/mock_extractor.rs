//! Mock extractor for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::StageError;
use crate::extractor::{ExtractedDocument, ExtractionReport, Extractor, FileFailure};

/// Mock implementation of the Extractor trait.
///
/// By default each file is read as UTF-8 text; unreadable or empty files
/// become failures. Specific files can be forced to fail by name.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    report: Arc<RwLock<Option<ExtractionReport>>>,
    failing_files: Arc<RwLock<HashSet<String>>>,
    error: Arc<RwLock<Option<String>>>,
    panic: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<Vec<PathBuf>>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this report instead of reading files.
    pub async fn set_report(&self, report: ExtractionReport) {
        *self.report.write().await = Some(report);
    }

    /// Fail extraction for files with this name.
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

    /// File lists received so far.
    pub async fn recorded_calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, files: &[PathBuf]) -> Result<ExtractionReport, StageError> {
        self.calls.write().await.push(files.to_vec());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let panic = self.panic.read().await.clone();
        if let Some(message) = panic {
            panic!("{}", message);
        }

        if let Some(message) = self.error.read().await.clone() {
            return Err(StageError::Command {
                program: "mock".to_string(),
                reason: message,
            });
        }

        if let Some(report) = self.report.read().await.clone() {
            return Ok(report);
        }

        let failing = self.failing_files.read().await.clone();
        let mut report = ExtractionReport {
            total_files: files.len(),
            ..Default::default()
        };

        for path in files {
            let failure = FileFailure::new(path, "forced failure");
            if failing.contains(&failure.file_name) {
                report.failures.push(failure);
                continue;
            }
            match tokio::fs::read_to_string(path).await {
                Ok(text) if !text.trim().is_empty() => report
                    .documents
                    .push(ExtractedDocument::new(path, text, "mock")),
                Ok(_) => report.failures.push(FileFailure::new(path, "no text")),
                Err(e) => report.failures.push(FileFailure::new(path, e.to_string())),
            }
        }

        Ok(report)
    }
}
