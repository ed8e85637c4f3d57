//! Workflow lifecycle integration tests.
//!
//! These tests drive complete runs through the dispatcher and runner with mock
//! collaborators:
//! initiated -> running (scraping -> processing -> analysis -> finalize) -> completed | failed

use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use docket_core::{
    testing::fixtures::{self, wait_for_terminal, MockPipeline},
    workflow::{NO_FILES_DOWNLOADED, NO_TEXT_EXTRACTED},
    ArtifactKind, Config, DispatchError, FinalStatus, Task, TaskStatus, WorkflowStage,
};

const WAIT: Duration = Duration::from_secs(5);

/// Test helper owning the pipeline and its scratch directory.
struct TestHarness {
    pipeline: MockPipeline,
    config: Config,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = fixtures::config_in(temp_dir.path());
        let pipeline = MockPipeline::new(&config);
        Self {
            pipeline,
            config,
            temp_dir,
        }
    }

    async fn trigger(&self, body: Value) -> String {
        self.pipeline
            .dispatcher
            .trigger(&body)
            .expect("trigger should succeed")
            .task_id
    }

    async fn run_to_end(&self, body: Value) -> Task {
        let task_id = self.trigger(body).await;
        wait_for_terminal(self.pipeline.store.as_ref(), &task_id, WAIT).await
    }
}

#[tokio::test]
async fn test_full_run_succeeds_with_all_summaries() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(3))
        .await;

    let task = harness
        .run_to_end(json!({ "page_numbers": [1, 2], "download_folder": "batch" }))
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Success));
    assert_eq!(task.current_stage, Some(WorkflowStage::Finalize));
    assert_eq!(task.message, "Workflow execution completed successfully");
    assert!(task.errors.is_empty(), "unexpected errors: {:?}", task.errors);
    assert!(task.completed_at.is_some());
    assert!(task.workflow_id.as_deref().unwrap().starts_with("workflow_"));

    let scraping = task.results.scraping_summary.expect("scraping summary");
    assert_eq!(scraping.files_downloaded, 3);
    let processing = task.results.processing_summary.expect("processing summary");
    assert_eq!(processing.files_processed, 3);
    assert_eq!(processing.files_failed, 0);
    let analysis = task.results.analysis_summary.expect("analysis summary");
    assert_eq!(analysis.documents_analyzed, 3);
    assert_eq!(analysis.successful_analyses, 3);

    // Collaborators saw the requested parameters
    let requests = harness.pipeline.scraper.recorded_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].page_numbers, vec![1, 2]);
    assert_eq!(
        requests[0].download_dir,
        harness.config.workflow.download_root.join("batch")
    );
    assert_eq!(harness.pipeline.extractor.recorded_calls().await[0].len(), 3);
    assert_eq!(harness.pipeline.analyzer.recorded_calls().await[0].len(), 3);
}

#[tokio::test]
async fn test_zero_downloads_short_circuits_to_failed_outcome() {
    let harness = TestHarness::new();

    let task = harness.run_to_end(json!({})).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Failed));
    assert_eq!(task.current_stage, Some(WorkflowStage::Finalize));
    assert_eq!(task.errors, vec![NO_FILES_DOWNLOADED.to_string()]);
    assert!(task.results.scraping_summary.is_some());
    assert!(task.results.processing_summary.is_none());
    assert!(task.results.analysis_summary.is_none());

    // Later stages never ran
    assert!(harness.pipeline.extractor.recorded_calls().await.is_empty());
    assert!(harness.pipeline.analyzer.recorded_calls().await.is_empty());
}

#[tokio::test]
async fn test_empty_page_list_short_circuits() {
    let harness = TestHarness::new();

    let task = harness.run_to_end(json!({ "page_numbers": [] })).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Failed));
    assert!(task.errors.contains(&NO_FILES_DOWNLOADED.to_string()));
}

#[tokio::test]
async fn test_no_text_extracted_skips_analysis() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(vec![
            ("a.pdf".to_string(), String::new()),
            ("b.pdf".to_string(), String::new()),
        ])
        .await;

    let task = harness.run_to_end(json!({})).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Failed));
    let processing = task.results.processing_summary.expect("processing summary");
    assert_eq!(processing.files_processed, 0);
    assert_eq!(processing.files_failed, 2);
    assert!(task.results.analysis_summary.is_none());
    assert_eq!(task.errors.last(), Some(&NO_TEXT_EXTRACTED.to_string()));
    assert!(task
        .errors
        .iter()
        .any(|e| e.starts_with("Failed to extract text from a.pdf")));
    assert!(harness.pipeline.analyzer.recorded_calls().await.is_empty());
}

#[tokio::test]
async fn test_partial_failures_are_non_fatal() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(3))
        .await;
    harness.pipeline.extractor.fail_file("circular_1.pdf").await;
    harness.pipeline.analyzer.fail_file("circular_2.pdf").await;

    let task = harness.run_to_end(json!({})).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Success));
    assert_eq!(task.errors.len(), 2);
    assert!(task.errors[0].starts_with("Failed to extract text from circular_1.pdf"));
    assert!(task.errors[1].starts_with("Analysis failed for circular_2.pdf"));

    let processing = task.results.processing_summary.unwrap();
    assert_eq!((processing.files_processed, processing.files_failed), (2, 1));
    let analysis = task.results.analysis_summary.unwrap();
    assert_eq!(
        (analysis.successful_analyses, analysis.failed_analyses),
        (1, 1)
    );
}

#[tokio::test]
async fn test_scraper_error_is_recorded_and_run_completes() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_error("listing site unreachable")
        .await;

    let task = harness.run_to_end(json!({})).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Failed));
    assert!(task.results.scraping_summary.is_none());
    assert!(task.errors[0].starts_with("Web scraping failed:"));
    assert!(task.errors[0].contains("listing site unreachable"));
    assert_eq!(task.errors[1], NO_FILES_DOWNLOADED);
}

#[tokio::test]
async fn test_analyzer_error_completes_with_failed_outcome() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(1))
        .await;
    harness.pipeline.analyzer.set_error("model offline").await;

    let task = harness.run_to_end(json!({})).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.final_status, Some(FinalStatus::Failed));
    assert_eq!(task.message, "Workflow execution completed with failures");
    assert!(task.results.scraping_summary.is_some());
    assert!(task.results.processing_summary.is_some());
    assert!(task.results.analysis_summary.is_none());
    assert!(task
        .errors
        .iter()
        .any(|e| e.starts_with("Document analysis failed:")));
}

#[tokio::test]
async fn test_stage_panic_marks_task_failed() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(2))
        .await;
    harness.pipeline.extractor.set_panic("extractor exploded").await;

    let task = harness.run_to_end(json!({})).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.final_status, Some(FinalStatus::Failed));
    assert!(task.message.starts_with("Workflow execution failed"));
    assert!(task.message.contains("extractor exploded"));
    assert!(task.errors.last().unwrap().contains("extractor exploded"));
    assert!(task.completed_at.is_some());
    // Data from the stage before the fault survives
    assert_eq!(task.results.scraping_summary.unwrap().files_downloaded, 2);
}

#[tokio::test]
async fn test_task_is_visible_before_run_finishes() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(1))
        .await;
    harness
        .pipeline
        .scraper
        .set_delay(Duration::from_millis(200))
        .await;

    let receipt = harness.pipeline.dispatcher.trigger(&json!({})).unwrap();
    assert_eq!(receipt.status, TaskStatus::Initiated);

    let task = harness
        .pipeline
        .store
        .get(&receipt.task_id)
        .unwrap()
        .expect("task exists right after trigger");
    assert!(matches!(
        task.status,
        TaskStatus::Initiated | TaskStatus::Running
    ));

    let done = wait_for_terminal(harness.pipeline.store.as_ref(), &receipt.task_id, WAIT).await;
    assert_eq!(done.final_status, Some(FinalStatus::Success));
}

#[tokio::test]
async fn test_concurrent_runs_do_not_share_results() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(2))
        .await;
    harness
        .pipeline
        .scraper
        .set_delay(Duration::from_millis(50))
        .await;

    let first = harness.trigger(json!({ "download_folder": "first" })).await;
    let second = harness.trigger(json!({ "download_folder": "second" })).await;
    assert_ne!(first, second);

    let store = harness.pipeline.store.as_ref();
    let first = wait_for_terminal(store, &first, WAIT).await;
    let second = wait_for_terminal(store, &second, WAIT).await;

    assert_eq!(first.parameters.download_folder, "first");
    assert_eq!(second.parameters.download_folder, "second");
    assert_ne!(first.workflow_id, second.workflow_id);
    for task in [&first, &second] {
        assert_eq!(task.final_status, Some(FinalStatus::Success));
        assert_eq!(task.results.scraping_summary.as_ref().unwrap().files_downloaded, 2);
        assert_eq!(task.results.analysis_summary.as_ref().unwrap().documents_analyzed, 2);
        assert!(task.errors.is_empty());
    }
}

#[tokio::test]
async fn test_invalid_parameters_create_no_task() {
    let harness = TestHarness::new();

    for body in [
        json!({ "page_numbers": ["a"] }),
        json!({ "page_numbers": "1" }),
        json!({ "page_numbers": [0] }),
        json!({ "download_folder": "../outside" }),
        json!({ "save_results": "yes" }),
        json!([1, 2]),
    ] {
        let err = harness.pipeline.dispatcher.trigger(&body).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)), "{:?}", body);
    }

    assert!(harness.pipeline.store.is_empty().unwrap());
    assert!(harness.pipeline.scraper.recorded_requests().await.is_empty());
}

#[tokio::test]
async fn test_artifacts_are_written_and_tagged_with_run() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(2))
        .await;

    let task = harness.run_to_end(json!({})).await;
    let artifacts = harness.pipeline.runner.artifacts();

    let scraping = artifacts
        .read_json(ArtifactKind::ScrapingMetadata)
        .await
        .expect("scraping metadata written");
    assert_eq!(scraping.data["task_id"], json!(task.id));
    assert_eq!(scraping.data["total_downloaded_files"], json!(2));

    let analysis = artifacts
        .read_json(ArtifactKind::AnalysisResults)
        .await
        .expect("analysis results written");
    assert_eq!(analysis.data["workflow_id"], json!(task.workflow_id));
    assert_eq!(analysis.data["metadata"]["successful"], json!(2));
    assert_eq!(analysis.data["documents"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_save_results_controls_workflow_report() {
    let harness = TestHarness::new();
    harness
        .pipeline
        .scraper
        .set_documents(fixtures::documents(1))
        .await;

    let saved = harness.run_to_end(json!({ "save_results": true })).await;
    let skipped = harness.run_to_end(json!({ "save_results": false })).await;

    let report_path = |task: &Task| {
        harness
            .config
            .output
            .dir
            .join(format!("workflow_results_{}.json", task.workflow_id.as_ref().unwrap()))
    };

    let raw = std::fs::read_to_string(report_path(&saved)).expect("report written");
    let report: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["task_id"], json!(saved.id));
    assert_eq!(report["final_status"], json!("SUCCESS"));
    assert!(report["results"]["analysis_summary"].is_object());

    assert!(!report_path(&skipped).exists());
    assert!(harness.temp_dir.path().join("output").exists());
}

#[tokio::test]
async fn test_clear_terminal_keeps_running_tasks() {
    let harness = TestHarness::new();

    let done = harness.run_to_end(json!({})).await;
    harness
        .pipeline
        .scraper
        .set_delay(Duration::from_secs(2))
        .await;
    let running = harness.trigger(json!({})).await;

    let store = harness.pipeline.store.as_ref();
    assert_eq!(store.clear_terminal().unwrap(), 1);
    assert!(store.get(&done.id).unwrap().is_none());
    assert!(store.get(&running).unwrap().is_some());
    assert_eq!(store.len().unwrap(), 1);
}
