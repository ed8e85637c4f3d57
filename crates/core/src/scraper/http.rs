//! HTTP listing scraper.

use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::StageError;
use crate::metrics;

use super::{DownloadedFile, PageReport, ScrapeReport, ScrapeRequest, Scraper};

/// Elements that can point at a document.
const LINK_SELECTOR: &str = "a[href], iframe[src], embed[src]";

/// A link found in a page, with the tag it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageLink {
    tag: String,
    target: String,
}

/// Scraper that fetches listing pages over HTTP and downloads linked documents.
pub struct HttpScraper {
    client: Client,
    config: ScraperConfig,
    base_url: Url,
    detail_pattern: Option<Regex>,
}

impl HttpScraper {
    /// Create a new HttpScraper with the given configuration.
    pub fn new(config: ScraperConfig) -> Result<Self, StageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StageError::Http(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| StageError::InvalidInput(format!("invalid base_url: {}", e)))?;

        let detail_pattern = config
            .detail_link_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| StageError::InvalidInput(format!("invalid detail_link_pattern: {}", e)))?;

        Ok(Self {
            client,
            config,
            base_url,
            detail_pattern,
        })
    }

    fn listing_url(&self, page: u32) -> String {
        self.config.listing_url.replace("{page}", &page.to_string())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, StageError> {
        let start = Instant::now();
        let result: Result<String, StageError> = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| StageError::Http(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(StageError::Http(format!("{} returned {}", url, status)));
            }
            response
                .text()
                .await
                .map_err(|e| StageError::Http(e.to_string()))
        }
        .await;

        metrics::observe_external_call(
            "listing_site",
            "fetch_page",
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        result
    }

    /// Document URLs referenced by a listing page, following detail pages if enabled.
    async fn discover_documents(
        &self,
        page_url: &Url,
        html: &str,
        errors: &mut Vec<String>,
    ) -> Vec<(Url, String)> {
        let mut found = Vec::new();
        let mut detail_pages = Vec::new();

        for link in extract_links(html) {
            let Some(url) = resolve_link(page_url, &link.target) else {
                continue;
            };
            if let Some(doc) = document_url(&url, &self.config.file_extension) {
                found.push((doc, page_url.to_string()));
            } else if link.tag == "a" && self.is_detail_page(&url) {
                detail_pages.push(url);
            }
        }

        if self.config.follow_detail_pages {
            let mut visited = HashSet::new();
            for detail in detail_pages {
                if !visited.insert(detail.to_string()) {
                    continue;
                }
                debug!(url = %detail, "Following detail page");
                match self.fetch_text(detail.as_str()).await {
                    Ok(detail_html) => {
                        for link in extract_links(&detail_html) {
                            let doc = resolve_link(&detail, &link.target)
                                .and_then(|u| document_url(&u, &self.config.file_extension));
                            if let Some(doc) = doc {
                                found.push((doc, detail.to_string()));
                            }
                        }
                    }
                    Err(e) => errors.push(format!("Failed to fetch detail page {}: {}", detail, e)),
                }
            }
        }

        found
    }

    fn is_detail_page(&self, url: &Url) -> bool {
        if url.host_str() != self.base_url.host_str() {
            return false;
        }
        match &self.detail_pattern {
            Some(pattern) => pattern.is_match(url.as_str()),
            None => url.path().to_ascii_lowercase().ends_with(".html"),
        }
    }

    async fn download(
        &self,
        url: &Url,
        source_url: &str,
        download_dir: &Path,
        file_name: String,
    ) -> Result<DownloadedFile, StageError> {
        let start = Instant::now();
        let result: Result<Vec<u8>, StageError> = async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| StageError::Http(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(StageError::Http(format!("{} returned {}", url, status)));
            }
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| StageError::Http(e.to_string()))
        }
        .await;

        metrics::observe_external_call(
            "listing_site",
            "download",
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        let bytes = result?;

        let path = download_dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StageError::io(&path, e))?;

        Ok(DownloadedFile {
            url: url.to_string(),
            source_url: source_url.to_string(),
            file_name,
            path,
            size_bytes: bytes.len() as u64,
        })
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    fn name(&self) -> &str {
        "http"
    }

    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeReport, StageError> {
        tokio::fs::create_dir_all(&request.download_dir)
            .await
            .map_err(|e| StageError::io(&request.download_dir, e))?;

        let mut report = ScrapeReport::default();
        let mut seen = HashSet::new();
        let mut used_names = HashSet::new();

        for &page_number in &request.page_numbers {
            let listing_url = self.listing_url(page_number);
            let mut page = PageReport {
                page_number,
                listing_url: listing_url.clone(),
                ..Default::default()
            };

            let page_url = match Url::parse(&listing_url) {
                Ok(url) => url,
                Err(e) => {
                    report
                        .errors
                        .push(format!("Page {}: invalid listing URL: {}", page_number, e));
                    report.pages.push(page);
                    continue;
                }
            };

            let html = match self.fetch_text(listing_url.as_str()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(page = page_number, error = %e, "Failed to fetch listing page");
                    report
                        .errors
                        .push(format!("Page {}: failed to fetch listing: {}", page_number, e));
                    report.pages.push(page);
                    continue;
                }
            };

            let documents = self
                .discover_documents(&page_url, &html, &mut report.errors)
                .await;

            for (url, source) in documents {
                if !seen.insert(url.to_string()) {
                    continue;
                }
                page.links_found += 1;
                let file_name = unique_file_name(
                    file_name_for(&url, &self.config.file_extension),
                    &mut used_names,
                );
                match self
                    .download(&url, &source, &request.download_dir, file_name)
                    .await
                {
                    Ok(file) => {
                        debug!(url = %url, path = %file.path.display(), "Downloaded document");
                        page.files.push(file);
                    }
                    Err(e) => {
                        report
                            .errors
                            .push(format!("Failed to download {}: {}", url, e));
                    }
                }
            }

            info!(
                page = page_number,
                links = page.links_found,
                downloaded = page.files.len(),
                "Scraped listing page"
            );
            report.pages.push(page);
        }

        Ok(report)
    }
}

/// All anchor/iframe/embed link targets in `html`, in document order.
fn extract_links(html: &str) -> Vec<PageLink> {
    let selector = match Selector::parse(LINK_SELECTOR) {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| {
            let tag = el.value().name();
            let attr = if tag == "a" { "href" } else { "src" };
            el.value().attr(attr).map(|target| PageLink {
                tag: tag.to_string(),
                target: target.trim().to_string(),
            })
        })
        .collect()
}

fn resolve_link(base: &Url, target: &str) -> Option<Url> {
    let lower = target.to_ascii_lowercase();
    if target.is_empty()
        || target.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
    {
        return None;
    }
    let url = base.join(target).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// The document URL `url` points at, directly or through a `file=` viewer parameter.
fn document_url(url: &Url, extension: &str) -> Option<Url> {
    let suffix = format!(".{}", extension.to_ascii_lowercase());
    if url.path().to_ascii_lowercase().ends_with(&suffix) {
        return Some(url.clone());
    }
    url.query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("file"))
        .filter(|(_, value)| value.to_ascii_lowercase().ends_with(&suffix))
        .and_then(|(_, value)| url.join(&value).ok())
}

/// Local file name for a downloaded document.
fn file_name_for(url: &Url, extension: &str) -> String {
    let raw = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default();
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    let mut name: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    name = name.trim().trim_start_matches('.').to_string();

    if name.is_empty() {
        name = format!("document_{}", uuid::Uuid::new_v4().simple());
    }
    let suffix = format!(".{}", extension);
    if !name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        name.push_str(&suffix);
    }
    name
}

/// Make `name` unique among the names already handed out in this scrape.
///
/// Collisions get a numeric suffix before the extension: `a.pdf`, `a_2.pdf`, `a_3.pdf`.
/// Comparison ignores case so names stay distinct on case-insensitive filesystems.
fn unique_file_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_lowercase()) {
        return name;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name.as_str(), ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}{}", stem, n, ext);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_links_finds_anchors_iframes_and_embeds() {
        let html = r#"
            <a class="x" href="/docs/circular.pdf">Circular</a>
            <A HREF='detail_1.html'>Detail</A>
            <iframe width="100" src="/viewer?file=/docs/other.pdf&amp;lang=en"></iframe>
            <embed src="inline.pdf" />
            <img src="logo.png">
        "#;

        let links = extract_links(html);
        assert_eq!(links.len(), 4);
        assert_eq!(links[0].tag, "a");
        assert_eq!(links[0].target, "/docs/circular.pdf");
        assert_eq!(links[1].target, "detail_1.html");
        assert_eq!(links[2].tag, "iframe");
        assert_eq!(links[2].target, "/viewer?file=/docs/other.pdf&lang=en");
        assert_eq!(links[3].tag, "embed");
    }

    #[test]
    fn test_extract_links_handles_unquoted_and_escaped_attributes() {
        let html = r#"
            <a href=/sebi_data/circular.pdf>Circular</a>
            <a title="a > b" href="/docs/gt.pdf">Greater</a>
            <a href="/viewer?file=/docs/x.pdf&lang=en&#38;v=2">Viewer</a>
            <a name="anchor-only">No target</a>
        "#;

        let links = extract_links(html);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].target, "/sebi_data/circular.pdf");
        assert_eq!(links[1].target, "/docs/gt.pdf");
        assert_eq!(links[2].target, "/viewer?file=/docs/x.pdf&lang=en&v=2");
    }

    #[test]
    fn test_same_basename_in_different_folders_gets_distinct_names() {
        let mut used = HashSet::new();
        let jan = unique_file_name(
            file_name_for(&url("https://example.com/jan-2024/circular.pdf"), "pdf"),
            &mut used,
        );
        let feb = unique_file_name(
            file_name_for(&url("https://example.com/feb-2024/circular.pdf"), "pdf"),
            &mut used,
        );
        let mar = unique_file_name(
            file_name_for(&url("https://example.com/mar-2024/CIRCULAR.pdf"), "pdf"),
            &mut used,
        );

        assert_eq!(jan, "circular.pdf");
        assert_eq!(feb, "circular_2.pdf");
        assert_eq!(mar, "CIRCULAR_3.pdf");
    }

    #[test]
    fn test_unique_file_name_without_extension() {
        let mut used = HashSet::new();
        assert_eq!(unique_file_name("notes".to_string(), &mut used), "notes");
        assert_eq!(unique_file_name("notes".to_string(), &mut used), "notes_2");
    }

    #[test]
    fn test_resolve_link_skips_non_http_targets() {
        let base = url("https://example.com/list/page.html");
        assert_eq!(
            resolve_link(&base, "a.pdf"),
            Some(url("https://example.com/list/a.pdf"))
        );
        assert_eq!(resolve_link(&base, "#top"), None);
        assert_eq!(resolve_link(&base, "javascript:void(0)"), None);
        assert_eq!(resolve_link(&base, "mailto:a@example.com"), None);
        assert_eq!(resolve_link(&base, "ftp://example.com/a.pdf"), None);
    }

    #[test]
    fn test_document_url_direct_and_viewer_param() {
        let direct = url("https://example.com/docs/Report.PDF");
        assert_eq!(document_url(&direct, "pdf"), Some(direct.clone()));

        let viewer = url("https://example.com/web/?file=https://cdn.example.com/a/b.pdf");
        assert_eq!(
            document_url(&viewer, "pdf"),
            Some(url("https://cdn.example.com/a/b.pdf"))
        );

        let relative_viewer = url("https://example.com/web/viewer.html?file=/files/c.pdf");
        assert_eq!(
            document_url(&relative_viewer, "pdf"),
            Some(url("https://example.com/files/c.pdf"))
        );

        assert_eq!(document_url(&url("https://example.com/page.html"), "pdf"), None);
    }

    #[test]
    fn test_file_name_for_decodes_and_sanitizes() {
        assert_eq!(
            file_name_for(&url("https://example.com/docs/Master%20Circular.pdf"), "pdf"),
            "Master Circular.pdf"
        );
        assert_eq!(
            file_name_for(&url("https://example.com/docs/a%3Ab"), "pdf"),
            "a_b.pdf"
        );
        assert!(file_name_for(&url("https://example.com/"), "pdf").starts_with("document_"));
    }

    #[test]
    fn test_detail_page_filter() {
        let scraper = HttpScraper::new(ScraperConfig {
            base_url: "https://example.com".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(scraper.is_detail_page(&url("https://example.com/legal/circular_1.html")));
        assert!(!scraper.is_detail_page(&url("https://other.com/legal/circular_1.html")));
        assert!(!scraper.is_detail_page(&url("https://example.com/about")));

        let filtered = HttpScraper::new(ScraperConfig {
            base_url: "https://example.com".to_string(),
            detail_link_pattern: Some("/legal/".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(filtered.is_detail_page(&url("https://example.com/legal/x")));
        assert!(!filtered.is_detail_page(&url("https://example.com/news/x.html")));
    }

    #[test]
    fn test_listing_url_substitutes_page() {
        let scraper = HttpScraper::new(ScraperConfig {
            listing_url: "https://example.com/list?page={page}".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(scraper.listing_url(3), "https://example.com/list?page=3");
    }

    #[test]
    fn test_invalid_detail_pattern_is_rejected() {
        let result = HttpScraper::new(ScraperConfig {
            detail_link_pattern: Some("(".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(StageError::InvalidInput(_))));
    }
}
