//! Extractor backed by external text-extraction programs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::config::{ExtractCommand, ExtractorConfig};
use crate::error::StageError;
use crate::metrics;

use super::{ExtractedDocument, ExtractionReport, Extractor, FileFailure};

const INPUT_PLACEHOLDER: &str = "{input}";
const PLAIN_TEXT_METHOD: &str = "plain_text";

/// Runs the configured command chain for each file, then falls back to
/// reading the file as UTF-8 text.
pub struct CommandExtractor {
    config: ExtractorConfig,
}

impl CommandExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn build_args(command: &ExtractCommand, input: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        command
            .args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input))
            .collect()
    }

    fn check_text(&self, text: &str) -> Result<(), String> {
        let len = text.trim().chars().count();
        if len < self.config.min_text_chars {
            return Err(format!(
                "extracted {} characters, need at least {}",
                len, self.config.min_text_chars
            ));
        }
        Ok(())
    }

    async fn run_command(
        &self,
        command: &ExtractCommand,
        input: &Path,
    ) -> Result<String, StageError> {
        let start = Instant::now();
        let limit = Duration::from_secs(self.config.timeout_secs);

        let child = Command::new(&command.program)
            .args(Self::build_args(command, input))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let result = match timeout(limit, child).await {
            Err(_) => Err(StageError::Timeout(limit)),
            Ok(Err(e)) => Err(StageError::Command {
                program: command.program.clone(),
                reason: if e.kind() == std::io::ErrorKind::NotFound {
                    "program not found".to_string()
                } else {
                    e.to_string()
                },
            }),
            Ok(Ok(output)) if !output.status.success() => Err(StageError::Command {
                program: command.program.clone(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
            Ok(Ok(output)) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        };

        metrics::observe_external_call(
            "extractor",
            &command.program,
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        result
    }

    async fn read_plain_text(&self, input: &Path) -> Result<String, String> {
        let bytes = tokio::fs::read(input).await.map_err(|e| e.to_string())?;
        String::from_utf8(bytes).map_err(|_| "file is not valid UTF-8 text".to_string())
    }

    /// Try every method in order; collect why each one failed.
    async fn extract_file(&self, input: &Path) -> Result<ExtractedDocument, FileFailure> {
        if tokio::fs::metadata(input).await.is_err() {
            return Err(FileFailure::new(input, "file not found"));
        }

        let mut attempts = Vec::new();

        for command in &self.config.commands {
            match self.run_command(command, input).await {
                Ok(text) => match self.check_text(&text) {
                    Ok(()) => return Ok(ExtractedDocument::new(input, text, &command.program)),
                    Err(reason) => attempts.push(format!("{}: {}", command.program, reason)),
                },
                Err(e) => {
                    debug!(
                        program = %command.program,
                        path = %input.display(),
                        error = %e,
                        "Extraction command failed"
                    );
                    attempts.push(format!("{}: {}", command.program, e));
                }
            }
        }

        if self.config.plain_text_fallback {
            match self.read_plain_text(input).await {
                Ok(text) => match self.check_text(&text) {
                    Ok(()) => return Ok(ExtractedDocument::new(input, text, PLAIN_TEXT_METHOD)),
                    Err(reason) => attempts.push(format!("{}: {}", PLAIN_TEXT_METHOD, reason)),
                },
                Err(reason) => attempts.push(format!("{}: {}", PLAIN_TEXT_METHOD, reason)),
            }
        }

        Err(FileFailure::new(
            input,
            format!("all extraction methods failed ({})", attempts.join("; ")),
        ))
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    fn name(&self) -> &str {
        "command"
    }

    async fn extract(&self, files: &[PathBuf]) -> Result<ExtractionReport, StageError> {
        let mut report = ExtractionReport {
            total_files: files.len(),
            ..Default::default()
        };

        for path in files {
            match self.extract_file(path).await {
                Ok(doc) => {
                    debug!(
                        path = %path.display(),
                        method = %doc.method,
                        chars = doc.char_count,
                        "Extracted text"
                    );
                    report.documents.push(doc);
                }
                Err(failure) => {
                    warn!(path = %path.display(), error = %failure.error, "Failed to extract text");
                    report.failures.push(failure);
                }
            }
        }

        Ok(report)
    }
}
