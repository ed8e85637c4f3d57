//! Pipeline state machine.
//!
//! One `run` call drives a single task through
//! `scraping -> (files?) -> processing -> (text?) -> analysis -> finalize`.
//! Every path ends in finalize exactly once, including panics inside a stage.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::analyzer::Analyzer;
use crate::artifact::{ArtifactKind, ArtifactStore};
use crate::extractor::{ExtractedDocument, Extractor};
use crate::metrics;
use crate::scraper::{ScrapeRequest, Scraper};
use crate::task::{
    AnalysisSummary, FinalStatus, ProcessingSummary, ScrapingSummary, Task, TaskStatus,
    TaskStore, WorkflowStage,
};

use super::report::{AnalysisResults, ScrapingMetadata, WorkflowReport};
use super::types::{RunContext, StageOutcome, WorkflowError};

pub const NO_FILES_DOWNLOADED: &str = "No files were downloaded in the scraping stage";
pub const NO_TEXT_EXTRACTED: &str = "No text was extracted from the downloaded files";

/// Correlation id for the artifacts of one run.
pub fn workflow_id_for(task_id: &str, at: DateTime<Utc>) -> String {
    let short: String = task_id.chars().take(8).collect();
    format!("workflow_{}_{}", at.format("%Y%m%d_%H%M%S"), short)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs the four-stage pipeline for tasks in a store.
pub struct WorkflowRunner {
    store: Arc<dyn TaskStore>,
    scraper: Arc<dyn Scraper>,
    extractor: Arc<dyn Extractor>,
    analyzer: Arc<dyn Analyzer>,
    artifacts: ArtifactStore,
    download_root: PathBuf,
}

impl WorkflowRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scraper: Arc<dyn Scraper>,
        extractor: Arc<dyn Extractor>,
        analyzer: Arc<dyn Analyzer>,
        artifacts: ArtifactStore,
        download_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            scraper,
            extractor,
            analyzer,
            artifacts,
            download_root: download_root.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Drive `task_id` to a terminal state and return the final record.
    ///
    /// Stage faults (errors and panics) are absorbed into the task record;
    /// `Err` means the task could not be started or its outcome could not be
    /// written at all.
    pub async fn run(&self, task_id: &str) -> Result<Task, WorkflowError> {
        let task = self
            .store
            .get(task_id)?
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.to_string()))?;

        let workflow_id = workflow_id_for(&task.id, Utc::now());
        let started = match self.store.update(task_id, &mut |t| {
            t.status = TaskStatus::Running;
            t.workflow_id = Some(workflow_id.clone());
            t.message = "Workflow execution started".to_string();
        }) {
            Ok(task) => task,
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Failed to start workflow run");
                return Err(e.into());
            }
        };

        info!(
            task_id = %task_id,
            workflow_id = %workflow_id,
            pages = ?started.parameters.page_numbers,
            download_folder = %started.parameters.download_folder,
            "Workflow run started"
        );
        metrics::RUNS_STARTED.inc();
        metrics::ACTIVE_RUNS.inc();

        let download_dir = self.download_root.join(&started.parameters.download_folder);
        let mut ctx = RunContext::new(&started, workflow_id, download_dir);

        let outcome = AssertUnwindSafe(self.execute(&mut ctx)).catch_unwind().await;
        let fault = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("Workflow execution failed: {}", e)),
            Err(payload) => Some(format!(
                "Workflow execution failed: stage panicked: {}",
                panic_message(payload.as_ref())
            )),
        };
        if let Some(fault) = &fault {
            error!(task_id = %task_id, error = %fault, "Workflow run faulted");
        }

        let result = self.finalize(&mut ctx, fault).await;
        metrics::ACTIVE_RUNS.dec();
        result
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), WorkflowError> {
        let files = match self.scraping_stage(ctx).await? {
            StageOutcome::Continue(files) => files,
            StageOutcome::ShortCircuit(reason) => {
                return self.short_circuit(ctx, WorkflowStage::Scraping, reason);
            }
        };

        let documents = match self.processing_stage(ctx, files).await? {
            StageOutcome::Continue(documents) => documents,
            StageOutcome::ShortCircuit(reason) => {
                return self.short_circuit(ctx, WorkflowStage::Processing, reason);
            }
        };

        self.analysis_stage(ctx, documents).await
    }

    fn short_circuit(
        &self,
        ctx: &mut RunContext,
        stage: WorkflowStage,
        reason: String,
    ) -> Result<(), WorkflowError> {
        warn!(task_id = %ctx.task_id, stage = %stage, reason = %reason, "Skipping to finalize");
        metrics::SHORT_CIRCUITS
            .with_label_values(&[stage.as_str()])
            .inc();
        ctx.short_circuit(reason);
        self.publish(ctx)
    }

    /// Mark the stage the run has entered.
    fn enter_stage(&self, ctx: &RunContext, stage: WorkflowStage) -> Result<(), WorkflowError> {
        debug!(task_id = %ctx.task_id, stage = %stage, "Entering stage");
        self.store
            .update(&ctx.task_id, &mut |t| t.current_stage = Some(stage))?;
        Ok(())
    }

    /// Copy accumulated errors and summaries into the task record.
    fn publish(&self, ctx: &RunContext) -> Result<(), WorkflowError> {
        self.store.update(&ctx.task_id, &mut |t| {
            t.errors = ctx.errors.clone();
            t.results.merge(&ctx.results);
        })?;
        Ok(())
    }

    fn record_stage_error(&self, ctx: &mut RunContext, stage: WorkflowStage, message: String) {
        warn!(task_id = %ctx.task_id, stage = %stage, error = %message, "Stage failed");
        metrics::STAGE_ERRORS
            .with_label_values(&[stage.as_str()])
            .inc();
        ctx.errors.push(message);
    }

    async fn scraping_stage(
        &self,
        ctx: &mut RunContext,
    ) -> Result<StageOutcome<Vec<PathBuf>>, WorkflowError> {
        self.enter_stage(ctx, WorkflowStage::Scraping)?;
        let timer = metrics::STAGE_DURATION
            .with_label_values(&["scraping"])
            .start_timer();

        let request = ScrapeRequest {
            page_numbers: ctx.parameters.page_numbers.clone(),
            download_dir: ctx.download_dir.clone(),
        };

        match self.scraper.scrape(&request).await {
            Ok(report) => {
                ctx.errors.extend(report.errors.iter().cloned());
                ctx.results.scraping_summary = Some(ScrapingSummary {
                    pages_processed: report.pages.len(),
                    files_downloaded: report.total_downloaded(),
                    links_found: report.total_links(),
                });
                metrics::STAGE_ITEMS
                    .with_label_values(&["scraping", "success"])
                    .inc_by(report.total_downloaded() as u64);

                info!(
                    task_id = %ctx.task_id,
                    scraper = self.scraper.name(),
                    downloaded = report.total_downloaded(),
                    links = report.total_links(),
                    errors = report.errors.len(),
                    "Scraping finished"
                );

                let written = self
                    .artifacts
                    .write(
                        ArtifactKind::ScrapingMetadata,
                        &ScrapingMetadata::new(ctx, &report),
                    )
                    .await;
                if let Err(e) = written {
                    ctx.errors
                        .push(format!("Failed to save scraping metadata: {}", e));
                }
                ctx.scrape = Some(report);
            }
            Err(e) => {
                self.record_stage_error(
                    ctx,
                    WorkflowStage::Scraping,
                    format!("Web scraping failed: {}", e),
                );
            }
        }

        timer.observe_duration();
        self.publish(ctx)?;

        let files = ctx
            .scrape
            .as_ref()
            .map(|report| report.downloaded_paths())
            .unwrap_or_default();
        if files.is_empty() {
            return Ok(StageOutcome::ShortCircuit(NO_FILES_DOWNLOADED.to_string()));
        }
        Ok(StageOutcome::Continue(files))
    }

    async fn processing_stage(
        &self,
        ctx: &mut RunContext,
        files: Vec<PathBuf>,
    ) -> Result<StageOutcome<Vec<ExtractedDocument>>, WorkflowError> {
        self.enter_stage(ctx, WorkflowStage::Processing)?;
        let timer = metrics::STAGE_DURATION
            .with_label_values(&["processing"])
            .start_timer();

        match self.extractor.extract(&files).await {
            Ok(report) => {
                for failure in &report.failures {
                    ctx.errors.push(format!(
                        "Failed to extract text from {}: {}",
                        failure.file_name, failure.error
                    ));
                }
                ctx.results.processing_summary = Some(ProcessingSummary {
                    files_processed: report.files_processed(),
                    files_failed: report.files_failed(),
                    total_files: report.total_files,
                });
                metrics::STAGE_ITEMS
                    .with_label_values(&["processing", "success"])
                    .inc_by(report.files_processed() as u64);
                metrics::STAGE_ITEMS
                    .with_label_values(&["processing", "failed"])
                    .inc_by(report.files_failed() as u64);

                info!(
                    task_id = %ctx.task_id,
                    extractor = self.extractor.name(),
                    processed = report.files_processed(),
                    failed = report.files_failed(),
                    "Processing finished"
                );
                ctx.extraction = Some(report);
            }
            Err(e) => {
                self.record_stage_error(
                    ctx,
                    WorkflowStage::Processing,
                    format!("Document processing failed: {}", e),
                );
            }
        }

        timer.observe_duration();
        self.publish(ctx)?;

        let documents = ctx
            .extraction
            .as_ref()
            .map(|report| report.documents.clone())
            .unwrap_or_default();
        if documents.is_empty() {
            return Ok(StageOutcome::ShortCircuit(NO_TEXT_EXTRACTED.to_string()));
        }
        Ok(StageOutcome::Continue(documents))
    }

    async fn analysis_stage(
        &self,
        ctx: &mut RunContext,
        documents: Vec<ExtractedDocument>,
    ) -> Result<(), WorkflowError> {
        self.enter_stage(ctx, WorkflowStage::Analysis)?;
        ctx.reached_analysis = true;
        let timer = metrics::STAGE_DURATION
            .with_label_values(&["analysis"])
            .start_timer();

        match self.analyzer.analyze(&documents).await {
            Ok(report) => {
                for doc in report.documents.iter().filter(|d| !d.is_success()) {
                    ctx.errors.push(format!(
                        "Analysis failed for {}: {}",
                        doc.file_name,
                        doc.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                ctx.results.analysis_summary = Some(AnalysisSummary {
                    documents_analyzed: report.documents.len(),
                    successful_analyses: report.successful(),
                    failed_analyses: report.failed(),
                });
                metrics::STAGE_ITEMS
                    .with_label_values(&["analysis", "success"])
                    .inc_by(report.successful() as u64);
                metrics::STAGE_ITEMS
                    .with_label_values(&["analysis", "failed"])
                    .inc_by(report.failed() as u64);

                info!(
                    task_id = %ctx.task_id,
                    analyzer = self.analyzer.name(),
                    successful = report.successful(),
                    failed = report.failed(),
                    "Analysis finished"
                );

                let written = self
                    .artifacts
                    .write(
                        ArtifactKind::AnalysisResults,
                        &AnalysisResults::new(ctx, &report),
                    )
                    .await;
                if let Err(e) = written {
                    ctx.errors
                        .push(format!("Failed to save analysis results: {}", e));
                }
                ctx.analysis = Some(report);
            }
            Err(e) => {
                self.record_stage_error(
                    ctx,
                    WorkflowStage::Analysis,
                    format!("Document analysis failed: {}", e),
                );
            }
        }

        timer.observe_duration();
        self.publish(ctx)
    }

    /// Write the terminal state. Runs exactly once per started run.
    async fn finalize(
        &self,
        ctx: &mut RunContext,
        fault: Option<String>,
    ) -> Result<Task, WorkflowError> {
        let status = if fault.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        // An analyzer that failed outright leaves no analysis summary to report.
        let analyzed = ctx.reached_analysis && ctx.results.analysis_summary.is_some();
        let final_status = if fault.is_none() && ctx.short_circuit.is_none() && analyzed {
            FinalStatus::Success
        } else {
            FinalStatus::Failed
        };
        let message = match &fault {
            Some(fault) => {
                ctx.errors.push(fault.clone());
                fault.clone()
            }
            None if final_status == FinalStatus::Success => {
                "Workflow execution completed successfully".to_string()
            }
            None => "Workflow execution completed with failures".to_string(),
        };
        let completed_at = Utc::now();

        if ctx.parameters.save_results {
            let report = WorkflowReport::new(ctx, status, final_status, completed_at);
            let written = self
                .artifacts
                .write_workflow_report(&ctx.workflow_id, &report)
                .await;
            if let Err(e) = written {
                ctx.errors
                    .push(format!("Failed to save workflow results: {}", e));
            }
        }

        let updated = self.store.update(&ctx.task_id, &mut |t| {
            t.status = status;
            t.final_status = Some(final_status);
            t.completed_at = Some(completed_at);
            t.current_stage = Some(WorkflowStage::Finalize);
            t.message = message.clone();
            t.errors = ctx.errors.clone();
            t.results.merge(&ctx.results);
        });

        let task = match updated {
            Ok(task) => task,
            Err(e) => {
                error!(task_id = %ctx.task_id, error = %e, "Failed to record workflow outcome");
                self.force_failed(ctx, &e.to_string(), completed_at)?
            }
        };

        let duration = (completed_at - ctx.started_at).num_milliseconds() as f64 / 1000.0;
        metrics::RUNS_FINISHED
            .with_label_values(&[task.status.as_str(), final_status.as_str()])
            .inc();
        metrics::RUN_DURATION
            .with_label_values(&[final_status.as_str()])
            .observe(duration);

        info!(
            task_id = %task.id,
            workflow_id = %ctx.workflow_id,
            status = %task.status,
            final_status = final_status.as_str(),
            errors = task.errors.len(),
            duration_secs = duration,
            "Workflow run finished"
        );
        Ok(task)
    }

    /// Last resort when the full outcome cannot be written: make the task
    /// terminal with whatever the record still accepts.
    fn force_failed(
        &self,
        ctx: &RunContext,
        reason: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<Task, WorkflowError> {
        let task = self.store.update(&ctx.task_id, &mut |t| {
            if !t.status.is_terminal() {
                t.status = TaskStatus::Failed;
                t.message = "Workflow execution failed".to_string();
                t.completed_at = Some(completed_at.max(t.started_at));
            }
            if t.final_status.is_none() {
                t.final_status = Some(FinalStatus::Failed);
            }
            t.errors
                .push(format!("Failed to record workflow outcome: {}", reason));
        })?;
        Ok(task)
    }
}
