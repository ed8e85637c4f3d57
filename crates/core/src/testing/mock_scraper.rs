//! Mock scraper for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::StageError;
use crate::scraper::{DownloadedFile, PageReport, ScrapeReport, ScrapeRequest, Scraper};

/// Mock implementation of the Scraper trait.
///
/// By default every scrape "downloads" the configured documents by writing
/// them into the request's download directory, all attributed to the first
/// requested page. An explicit report, error, panic or delay can be set.
///
/// # Example
///
/// ```rust,ignore
/// use docket_core::testing::{fixtures, MockScraper};
///
/// let scraper = MockScraper::new();
/// scraper.set_documents(fixtures::documents(2)).await;
///
/// let report = scraper.scrape(&request).await?;
/// assert_eq!(report.total_downloaded(), 2);
/// assert_eq!(scraper.recorded_requests().await.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockScraper {
    /// `(file name, contents)` written on each scrape.
    documents: Arc<RwLock<Vec<(String, String)>>>,
    /// Report returned verbatim instead of writing documents.
    report: Arc<RwLock<Option<ScrapeReport>>>,
    /// Non-fatal errors added to the generated report.
    report_errors: Arc<RwLock<Vec<String>>>,
    /// If set, scrapes fail with this message.
    error: Arc<RwLock<Option<String>>>,
    /// If set, scrapes panic with this message.
    panic: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    requests: Arc<RwLock<Vec<ScrapeRequest>>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents written into the download directory on each scrape.
    pub async fn set_documents(&self, documents: Vec<(String, String)>) {
        *self.documents.write().await = documents;
    }

    /// Return this report instead of writing documents.
    pub async fn set_report(&self, report: ScrapeReport) {
        *self.report.write().await = Some(report);
    }

    /// Non-fatal errors to include in generated reports.
    pub async fn set_report_errors(&self, errors: Vec<String>) {
        *self.report_errors.write().await = errors;
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

    /// Requests received so far.
    pub async fn recorded_requests(&self) -> Vec<ScrapeRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl Scraper for MockScraper {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeReport, StageError> {
        self.requests.write().await.push(request.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let panic = self.panic.read().await.clone();
        if let Some(message) = panic {
            panic!("{}", message);
        }

        if let Some(message) = self.error.read().await.clone() {
            return Err(StageError::Http(message));
        }

        if let Some(report) = self.report.read().await.clone() {
            return Ok(report);
        }

        tokio::fs::create_dir_all(&request.download_dir)
            .await
            .map_err(|e| StageError::io(&request.download_dir, e))?;

        let mut files = Vec::new();
        for (name, contents) in self.documents.read().await.iter() {
            let path = request.download_dir.join(name);
            tokio::fs::write(&path, contents)
                .await
                .map_err(|e| StageError::io(&path, e))?;
            files.push(DownloadedFile {
                url: format!("https://mock.example/docs/{}", name),
                source_url: "https://mock.example/listing".to_string(),
                file_name: name.clone(),
                path,
                size_bytes: contents.len() as u64,
            });
        }

        let mut pages: Vec<PageReport> = request
            .page_numbers
            .iter()
            .map(|&page_number| PageReport {
                page_number,
                listing_url: format!("https://mock.example/listing?page={}", page_number),
                ..Default::default()
            })
            .collect();
        if let Some(first) = pages.first_mut() {
            first.links_found = files.len();
            first.files = files;
        }

        Ok(ScrapeReport {
            pages,
            errors: self.report_errors.read().await.clone(),
        })
    }
}
