//! Analyzer that classifies documents with an LLM.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::error::StageError;
use crate::extractor::ExtractedDocument;
use crate::metrics;

use super::llm::{CompletionRequest, LlmClient};
use super::prompt::{build_analysis_prompt, parse_json_response, truncate_chars, SYSTEM_PROMPT};
use super::{AnalysisReport, Analyzer, DocumentAnalysis, DocumentJudgment};

const NOT_SPECIFIED: &str = "Not Specified";
const MAX_LIST_ITEMS: usize = 10;

/// Sends each document to an LLM and parses the structured judgment.
pub struct LlmAnalyzer {
    client: Arc<dyn LlmClient>,
    config: AnalyzerConfig,
}

impl LlmAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, config: AnalyzerConfig) -> Self {
        Self { client, config }
    }

    async fn analyze_one(&self, doc: &ExtractedDocument) -> Result<DocumentJudgment, String> {
        let content = truncate_chars(&doc.text, self.config.max_content_chars);
        let prompt =
            build_analysis_prompt(content, &self.config.departments, &self.config.intermediaries);
        let request = CompletionRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let start = Instant::now();
        let result = self.client.complete(request).await;
        metrics::observe_external_call(
            "llm",
            self.client.provider(),
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        let response = result.map_err(|e| e.to_string())?;

        let provider = self.client.provider();
        metrics::LLM_TOKENS
            .with_label_values(&[provider, "input"])
            .inc_by(response.usage.input_tokens as u64);
        metrics::LLM_TOKENS
            .with_label_values(&[provider, "output"])
            .inc_by(response.usage.output_tokens as u64);

        let value = parse_json_response(&response.text)?;
        let judgment: DocumentJudgment = serde_json::from_value(value)
            .map_err(|e| format!("Unexpected judgment shape: {}", e))?;
        Ok(self.normalize(judgment))
    }

    /// Snap labels onto the configured vocabularies and cap list lengths.
    fn normalize(&self, mut judgment: DocumentJudgment) -> DocumentJudgment {
        judgment.department = find_label(&self.config.departments, &judgment.department)
            .unwrap_or(NOT_SPECIFIED)
            .to_string();

        let mut intermediaries: Vec<String> = Vec::new();
        for name in &judgment.intermediary {
            if let Some(label) = find_label(&self.config.intermediaries, name) {
                if !intermediaries.iter().any(|i| i == label) {
                    intermediaries.push(label.to_string());
                }
            }
        }
        judgment.intermediary = intermediaries;

        judgment.key_clauses.truncate(MAX_LIST_ITEMS);
        judgment.key_metrics.truncate(MAX_LIST_ITEMS);
        judgment.actionable_items.truncate(MAX_LIST_ITEMS);
        judgment
    }
}

fn find_label<'a>(vocabulary: &'a [String], candidate: &str) -> Option<&'a str> {
    let candidate = candidate.trim();
    vocabulary
        .iter()
        .find(|label| label.eq_ignore_ascii_case(candidate))
        .map(String::as_str)
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn analyze(&self, documents: &[ExtractedDocument]) -> Result<AnalysisReport, StageError> {
        let mut results = Vec::with_capacity(documents.len());

        for doc in documents {
            match self.analyze_one(doc).await {
                Ok(judgment) => {
                    debug!(
                        file = %doc.file_name,
                        department = %judgment.department,
                        "Analyzed document"
                    );
                    results.push(DocumentAnalysis::success(doc, judgment));
                }
                Err(error) => {
                    warn!(file = %doc.file_name, error = %error, "Document analysis failed");
                    results.push(DocumentAnalysis::failure(doc, error));
                }
            }
        }

        Ok(AnalysisReport::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{CompletionResponse, LlmError, LlmUsage};
    use std::sync::Mutex;

    /// LLM stub returning canned responses in order.
    struct ScriptedLlm {
        responses: Mutex<Vec<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.prompt);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no more responses".to_string()));
            next.map(|text| CompletionResponse {
                text,
                usage: LlmUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
                model: "test".to_string(),
            })
            .map_err(LlmError::Http)
        }
    }

    fn config() -> AnalyzerConfig {
        AnalyzerConfig {
            departments: vec!["Market Regulation Department".to_string()],
            intermediaries: vec!["Stock Brokers".to_string(), "Depositories".to_string()],
            max_content_chars: 5,
            ..Default::default()
        }
    }

    fn doc(name: &str, text: &str) -> ExtractedDocument {
        ExtractedDocument::new(name, text, "plain_text")
    }

    #[tokio::test]
    async fn test_per_document_failures_are_recorded() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(r#"{"department": "market regulation department", "intermediary": ["stock brokers", "Banks"], "key_clauses": ["c1"]}"#),
            Err("connection refused"),
            Ok("not json at all"),
        ]));
        let analyzer = LlmAnalyzer::new(llm.clone(), config());

        let report = analyzer
            .analyze(&[doc("a.pdf", "aaa"), doc("b.pdf", "bbb"), doc("c.pdf", "ccc")])
            .await
            .unwrap();

        assert_eq!(report.documents.len(), 3);
        assert_eq!(report.successful(), 1);
        assert_eq!(report.failed(), 2);

        let judgment = report.documents[0].judgment.as_ref().unwrap();
        assert_eq!(judgment.department, "Market Regulation Department");
        assert_eq!(judgment.intermediary, vec!["Stock Brokers".to_string()]);
        assert_eq!(judgment.key_clauses, vec!["c1".to_string()]);

        assert!(report.documents[1]
            .error
            .as_deref()
            .unwrap()
            .contains("connection refused"));
        assert!(report.documents[2]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Unable to parse JSON response"));
    }

    #[tokio::test]
    async fn test_unknown_department_becomes_not_specified() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"{"department": "Finance"}"#)]));
        let analyzer = LlmAnalyzer::new(llm, config());

        let report = analyzer.analyze(&[doc("a.pdf", "text")]).await.unwrap();
        let judgment = report.documents[0].judgment.as_ref().unwrap();
        assert_eq!(judgment.department, "Not Specified");
        assert!(judgment.intermediary.is_empty());
    }

    #[tokio::test]
    async fn test_content_is_truncated_in_prompt() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("{}")]));
        let analyzer = LlmAnalyzer::new(llm.clone(), config());

        analyzer
            .analyze(&[doc("a.pdf", "0123456789")])
            .await
            .unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("01234\n"));
        assert!(!prompts[0].contains("56789"));
    }

    #[tokio::test]
    async fn test_list_lengths_are_capped() {
        let clauses: Vec<String> = (0..15).map(|i| format!("\"c{}\"", i)).collect();
        let response = format!("{{\"key_clauses\": [{}]}}", clauses.join(","));
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(response.as_str())]));
        let analyzer = LlmAnalyzer::new(llm, config());

        let report = analyzer.analyze(&[doc("a.pdf", "text")]).await.unwrap();
        assert_eq!(
            report.documents[0].judgment.as_ref().unwrap().key_clauses.len(),
            10
        );
    }
}
