//! Serialized shapes of the artifacts a run writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::analyzer::{AnalysisReport, DocumentAnalysis};
use crate::extractor::{ExtractionReport, FileFailure};
use crate::scraper::{PageReport, ScrapeReport};
use crate::task::{FinalStatus, TaskResults, TaskStatus, WorkflowParameters};

use super::types::RunContext;

/// Contents of the shared scraping metadata artifact.
#[derive(Debug, Serialize)]
pub struct ScrapingMetadata<'a> {
    pub workflow_id: &'a str,
    pub task_id: &'a str,
    pub scraped_at: DateTime<Utc>,
    pub page_numbers: &'a [u32],
    pub download_dir: &'a PathBuf,
    pub total_links: usize,
    pub total_downloaded_files: usize,
    pub pages: &'a [PageReport],
    pub errors: &'a [String],
}

impl<'a> ScrapingMetadata<'a> {
    pub fn new(ctx: &'a RunContext, report: &'a ScrapeReport) -> Self {
        Self {
            workflow_id: &ctx.workflow_id,
            task_id: &ctx.task_id,
            scraped_at: Utc::now(),
            page_numbers: &ctx.parameters.page_numbers,
            download_dir: &ctx.download_dir,
            total_links: report.total_links(),
            total_downloaded_files: report.total_downloaded(),
            pages: &report.pages,
            errors: &report.errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisMetadata {
    pub total_documents: usize,
    pub successful: usize,
    pub failed: usize,
    pub analysis_timestamp: DateTime<Utc>,
}

/// Contents of the shared analysis results artifact.
#[derive(Debug, Serialize)]
pub struct AnalysisResults<'a> {
    pub workflow_id: &'a str,
    pub task_id: &'a str,
    pub metadata: AnalysisMetadata,
    pub documents: &'a [DocumentAnalysis],
}

impl<'a> AnalysisResults<'a> {
    pub fn new(ctx: &'a RunContext, report: &'a AnalysisReport) -> Self {
        Self {
            workflow_id: &ctx.workflow_id,
            task_id: &ctx.task_id,
            metadata: AnalysisMetadata {
                total_documents: report.documents.len(),
                successful: report.successful(),
                failed: report.failed(),
                analysis_timestamp: report.analyzed_at,
            },
            documents: &report.documents,
        }
    }
}

/// Extraction outcome without the (potentially large) document text.
#[derive(Debug, Serialize)]
pub struct ProcessedFile<'a> {
    pub file_name: &'a str,
    pub method: &'a str,
    pub char_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ProcessingDetails<'a> {
    pub total_files: usize,
    pub processed: Vec<ProcessedFile<'a>>,
    pub failures: &'a [FileFailure],
}

impl<'a> From<&'a ExtractionReport> for ProcessingDetails<'a> {
    fn from(report: &'a ExtractionReport) -> Self {
        Self {
            total_files: report.total_files,
            processed: report
                .documents
                .iter()
                .map(|d| ProcessedFile {
                    file_name: &d.file_name,
                    method: &d.method,
                    char_count: d.char_count,
                })
                .collect(),
            failures: &report.failures,
        }
    }
}

/// Per-run report written to `workflow_results_<workflow_id>.json` when
/// the task asked for `save_results`.
#[derive(Debug, Serialize)]
pub struct WorkflowReport<'a> {
    pub workflow_id: &'a str,
    pub task_id: &'a str,
    pub status: TaskStatus,
    pub final_status: FinalStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub parameters: &'a WorkflowParameters,
    pub errors: &'a [String],
    pub results: &'a TaskResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraping: Option<&'a ScrapeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingDetails<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<&'a AnalysisReport>,
}

impl<'a> WorkflowReport<'a> {
    pub fn new(
        ctx: &'a RunContext,
        status: TaskStatus,
        final_status: FinalStatus,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id: &ctx.workflow_id,
            task_id: &ctx.task_id,
            status,
            final_status,
            started_at: ctx.started_at,
            completed_at,
            parameters: &ctx.parameters,
            errors: &ctx.errors,
            results: &ctx.results,
            scraping: ctx.scrape.as_ref(),
            processing: ctx.extraction.as_ref().map(ProcessingDetails::from),
            analysis: ctx.analysis.as_ref(),
        }
    }
}
