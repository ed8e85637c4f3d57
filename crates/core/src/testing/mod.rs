//! Testing utilities and mock collaborators.
//!
//! The mocks stand in for the scraper, extractor and analyzer so the whole
//! pipeline can run in tests without network access, external programs or
//! an LLM.
//!
//! # Example
//!
//! ```rust,ignore
//! use docket_core::testing::{fixtures, MockAnalyzer, MockExtractor, MockScraper};
//!
//! let scraper = MockScraper::new();
//! scraper.set_documents(fixtures::documents(3)).await;
//!
//! let analyzer = MockAnalyzer::new();
//! analyzer.fail_file("circular_2.pdf").await;
//!
//! // Hand them to a WorkflowRunner...
//! ```

mod mock_analyzer;
mod mock_extractor;
mod mock_scraper;

pub use mock_analyzer::MockAnalyzer;
pub use mock_extractor::MockExtractor;
pub use mock_scraper::MockScraper;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::analyzer::DocumentJudgment;
    use crate::artifact::ArtifactStore;
    use crate::config::{Config, OutputConfig, WorkflowConfig};
    use crate::task::{InMemoryTaskStore, Task, TaskStore};
    use crate::workflow::{Dispatcher, WorkflowRunner};

    use super::{MockAnalyzer, MockExtractor, MockScraper};

    /// `count` small text documents named `circular_<n>.pdf`.
    pub fn documents(count: usize) -> Vec<(String, String)> {
        (1..=count)
            .map(|i| {
                (
                    format!("circular_{}.pdf", i),
                    format!("Circular {} on disclosure requirements for stock brokers.", i),
                )
            })
            .collect()
    }

    /// A plausible classification result.
    pub fn judgment() -> DocumentJudgment {
        DocumentJudgment {
            department: "Market Intermediaries Regulation and Supervision Department".to_string(),
            intermediary: vec!["Stock Brokers".to_string()],
            key_clauses: vec!["Regulation 9 of the Stock Brokers Regulations".to_string()],
            key_metrics: vec!["30 days".to_string()],
            actionable_items: vec!["Update client disclosure documents".to_string()],
        }
    }

    /// Configuration writing everything under `root`.
    pub fn config_in(root: &Path) -> Config {
        Config {
            output: OutputConfig {
                dir: root.join("output"),
                ..Default::default()
            },
            workflow: WorkflowConfig {
                download_root: root.join("downloads"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A runner and dispatcher wired to mock collaborators and an in-memory store.
    pub struct MockPipeline {
        pub store: Arc<dyn TaskStore>,
        pub scraper: MockScraper,
        pub extractor: MockExtractor,
        pub analyzer: MockAnalyzer,
        pub runner: Arc<WorkflowRunner>,
        pub dispatcher: Arc<Dispatcher>,
    }

    impl MockPipeline {
        pub fn new(config: &Config) -> Self {
            let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
            let scraper = MockScraper::new();
            let extractor = MockExtractor::new();
            let analyzer = MockAnalyzer::new();

            let runner = Arc::new(WorkflowRunner::new(
                Arc::clone(&store),
                Arc::new(scraper.clone()),
                Arc::new(extractor.clone()),
                Arc::new(analyzer.clone()),
                ArtifactStore::new(&config.output),
                config.workflow.download_root.clone(),
            ));
            let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&runner), &config.workflow));

            Self {
                store,
                scraper,
                extractor,
                analyzer,
                runner,
                dispatcher,
            }
        }
    }

    /// Poll `store` until the task is terminal.
    ///
    /// Panics if it is missing or still running after `timeout`.
    pub async fn wait_for_terminal(
        store: &dyn TaskStore,
        task_id: &str,
        timeout: Duration,
    ) -> Task {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = store
                .get(task_id)
                .expect("task store failed")
                .expect("task not found");
            if task.status.is_terminal() {
                return task;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("task {} still {} after {:?}", task_id, task.status, timeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
