//! Listing scraper collaborator.
//!
//! A scraper walks the requested listing pages and downloads the documents
//! they reference into a directory.

mod http;

pub use http::HttpScraper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StageError;

/// Input of one scraping stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub page_numbers: Vec<u32>,
    /// Directory receiving downloaded files; created if missing.
    pub download_dir: PathBuf,
}

/// A document saved to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadedFile {
    /// URL the document was downloaded from.
    pub url: String,
    /// Page the document link was found on.
    pub source_url: String,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// What happened on one listing page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageReport {
    pub page_number: u32,
    pub listing_url: String,
    /// Distinct document links discovered from this page.
    pub links_found: usize,
    pub files: Vec<DownloadedFile>,
}

/// Result of a scraping stage.
///
/// `errors` holds per-page and per-link problems that did not stop the stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeReport {
    pub pages: Vec<PageReport>,
    pub errors: Vec<String>,
}

impl ScrapeReport {
    pub fn total_downloaded(&self) -> usize {
        self.pages.iter().map(|p| p.files.len()).sum()
    }

    pub fn total_links(&self) -> usize {
        self.pages.iter().map(|p| p.links_found).sum()
    }

    /// Local paths of every downloaded file, in download order.
    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.pages
            .iter()
            .flat_map(|p| p.files.iter().map(|f| f.path.clone()))
            .collect()
    }
}

/// Scraper collaborator used by the scraping stage.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &str;

    /// Scrape every requested page in order.
    ///
    /// Returns `Err` only when nothing could be attempted at all (for example
    /// the download directory cannot be created).
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeReport, StageError>;
}
