//! Analysis prompt construction and response parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

pub const SYSTEM_PROMPT: &str = "You are an expert analyst of securities market regulatory \
documents. You answer with a single JSON object and nothing else.";

/// Build the classification prompt for one document.
///
/// `content` should already be truncated to the configured limit.
pub fn build_analysis_prompt(
    content: &str,
    departments: &[String],
    intermediaries: &[String],
) -> String {
    let departments = bullet_list(departments);
    let intermediaries = bullet_list(intermediaries);

    format!(
        r#"Analyze the following regulatory circular and extract key information as JSON.

DOCUMENT CONTENT:
{content}

Respond with a JSON object of this shape:

{{
    "department": "exact match from the departments list below, or 'Not Specified'",
    "intermediary": ["exact matches from the intermediaries list below; empty if none apply"],
    "key_clauses": ["important regulatory clauses, provisions or requirements"],
    "key_metrics": ["numbers, percentages, timelines, amounts or other quantitative measures"],
    "actionable_items": ["specific actions, compliance requirements or implementation steps"]
}}

AVAILABLE DEPARTMENTS (choose exactly one):
{departments}

AVAILABLE INTERMEDIARIES (choose all that apply):
{intermediaries}

Rules:
1. "department" must be copied exactly from the list, or "Not Specified".
2. "intermediary" may only contain names copied exactly from the list.
3. Return at most 10 entries for each of "key_clauses", "key_metrics" and "actionable_items".
4. Every array item must be a string. Respond only with valid JSON."#
    )
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a model response as JSON, tolerating code fences, leading prose,
/// trailing commas and trailing garbage after the last closing brace.
pub fn parse_json_response(text: &str) -> Result<serde_json::Value, String> {
    let stripped = CODE_FENCE.replace_all(text, "");
    let mut content = stripped.trim();

    if let Some(start) = content.find('{') {
        content = &content[start..];
    }
    if !content.ends_with('}') {
        if let Some(end) = content.rfind('}') {
            content = &content[..=end];
        }
    }

    let cleaned = TRAILING_COMMA.replace_all(content, "$1");
    serde_json::from_str(&cleaned).map_err(|e| format!("Unable to parse JSON response: {}", e))
}

/// First `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
