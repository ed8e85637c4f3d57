//! Errors reported by stage collaborators.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A failure reported by a scraper, extractor or analyzer.
///
/// Returning `Err` from a collaborator means the whole stage call failed;
/// per-item problems belong in the collaborator's report instead.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command `{program}` failed: {reason}")]
    Command { program: String, reason: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }
}
