//! Document text extraction collaborator.

mod command;

pub use command::CommandExtractor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StageError;

/// Text pulled out of one downloaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub text: String,
    /// Which method produced the text (command program or `plain_text`).
    pub method: String,
    pub char_count: usize,
}

impl ExtractedDocument {
    pub fn new(
        path: impl Into<PathBuf>,
        text: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let text = text.into();
        Self {
            file_name: display_name(&path),
            char_count: text.chars().count(),
            path,
            text,
            method: method.into(),
        }
    }
}

/// A file no extraction method could read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub file_name: String,
    pub error: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            file_name: display_name(&path),
            path,
            error: error.into(),
        }
    }
}

/// Result of an extraction stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionReport {
    pub total_files: usize,
    pub documents: Vec<ExtractedDocument>,
    pub failures: Vec<FileFailure>,
}

impl ExtractionReport {
    pub fn files_processed(&self) -> usize {
        self.documents.len()
    }

    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Extractor collaborator used by the processing stage.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &str;

    /// Extract text from each file; unreadable files become `failures`.
    async fn extract(&self, files: &[PathBuf]) -> Result<ExtractionReport, StageError>;
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
