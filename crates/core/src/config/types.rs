use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

/// Where result artifacts are written.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory holding the shared artifacts and per-run reports.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_scraping_metadata_file")]
    pub scraping_metadata_file: String,
    #[serde(default = "default_analysis_results_file")]
    pub analysis_results_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            scraping_metadata_file: default_scraping_metadata_file(),
            analysis_results_file: default_analysis_results_file(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_scraping_metadata_file() -> String {
    "scraping_metadata.json".to_string()
}

fn default_analysis_results_file() -> String {
    "analysis_results.json".to_string()
}

/// Defaults applied to trigger requests and the root for download folders.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Download folders named in trigger requests are resolved against this directory.
    #[serde(default = "default_download_root")]
    pub download_root: PathBuf,
    #[serde(default = "default_download_folder")]
    pub default_download_folder: String,
    #[serde(default = "default_page_numbers")]
    pub default_page_numbers: Vec<u32>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            download_root: default_download_root(),
            default_download_folder: default_download_folder(),
            default_page_numbers: default_page_numbers(),
        }
    }
}

fn default_download_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_download_folder() -> String {
    "test_enhanced_metadata".to_string()
}

fn default_page_numbers() -> Vec<u32> {
    vec![1]
}

/// Listing scraper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Base URL used to resolve relative links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Listing page URL template; `{page}` is replaced by the page number.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
    /// Extension (without dot) identifying downloadable documents.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Follow non-document listing links one level deep to look for documents.
    #[serde(default = "default_true")]
    pub follow_detail_pages: bool,
    /// Only follow same-host listing links matching this regex (`.html` pages when unset).
    #[serde(default)]
    pub detail_link_pattern: Option<String>,
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_url: default_listing_url(),
            file_extension: default_file_extension(),
            follow_detail_pages: true,
            detail_link_pattern: None,
            timeout_secs: default_scraper_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.sebi.gov.in".to_string()
}

fn default_listing_url() -> String {
    "https://www.sebi.gov.in/sebiweb/home/HomeAction.do?doListing=yes&sid=1&ssid=7&smid=0&pageno={page}"
        .to_string()
}

fn default_file_extension() -> String {
    "pdf".to_string()
}

fn default_true() -> bool {
    true
}

fn default_scraper_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("docket/", env!("CARGO_PKG_VERSION")).to_string()
}

/// One external text-extraction program in the fallback chain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExtractCommand {
    pub program: String,
    /// Arguments; the literal `{input}` is replaced by the file path.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Document text extractor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Programs tried in order until one yields text.
    #[serde(default = "default_extract_commands")]
    pub commands: Vec<ExtractCommand>,
    /// Per-command timeout in seconds.
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,
    /// Read the file as UTF-8 text when every command fails.
    #[serde(default = "default_true")]
    pub plain_text_fallback: bool,
    /// Minimum trimmed text length for an extraction to count.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            commands: default_extract_commands(),
            timeout_secs: default_extractor_timeout(),
            plain_text_fallback: true,
            min_text_chars: default_min_text_chars(),
        }
    }
}

fn default_extract_commands() -> Vec<ExtractCommand> {
    vec![ExtractCommand {
        program: "pdftotext".to_string(),
        args: vec!["-layout".to_string(), "{input}".to_string(), "-".to_string()],
    }]
}

fn default_extractor_timeout() -> u64 {
    60
}

fn default_min_text_chars() -> usize {
    1
}

/// LLM provider backing the analyzer.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerProvider {
    Ollama,
    Anthropic,
}

impl AnalyzerProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerProvider::Ollama => "ollama",
            AnalyzerProvider::Anthropic => "anthropic",
        }
    }
}

/// Document analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_provider")]
    pub provider: AnalyzerProvider,
    #[serde(default = "default_model")]
    pub model: String,
    /// Override the provider's API base URL.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Document text beyond this many characters is not sent to the model.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Departments the model may assign.
    #[serde(default = "default_departments")]
    pub departments: Vec<String>,
    /// Intermediaries the model may tag.
    #[serde(default = "default_intermediaries")]
    pub intermediaries: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_base: None,
            api_key: None,
            max_content_chars: default_max_content_chars(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            departments: default_departments(),
            intermediaries: default_intermediaries(),
        }
    }
}

fn default_provider() -> AnalyzerProvider {
    AnalyzerProvider::Ollama
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_max_content_chars() -> usize {
    12_000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_departments() -> Vec<String> {
    [
        "Alternative Investment Fund and Foreign Portfolio Investors Department",
        "Corporation Finance Department",
        "Department Economic and Policy Analysis",
        "Department of Debt and Hybrid Securities",
        "Enforcement Department - 1",
        "Information Technology Department",
        "Investment Management Department",
        "Market Intermediaries Regulation and Supervision Department",
        "Market Regulation Department",
        "Office of Investor Assistance and Education",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_intermediaries() -> Vec<String> {
    [
        "Banker to an Issue",
        "Debentures Trustee",
        "Credit Rating Agency - CRA",
        "KYC (Know Your Client) Registration Agency registered with SEBI",
        "Merchant Bankers",
        "Registrars to an issue and share Transfer Agents",
        "Underwriters",
        "Registered Alternative Investment Funds",
        "Registered Venture Capital Funds",
        "Registered Mutual Funds",
        "Registered Foreign Venture Capital Investors",
        "Registered Custodians",
        "Deemed FPIs (Erstwhile Sub-Accounts)",
        "FPIs / Deemed FPIs (Erstwhile FIIs/QFIs)",
        "Registered Stock Brokers in equity segment",
        "Registered Stock Brokers in Equity Derivative Segment",
        "Registered Stock Brokers in Currency Derivative Segment",
        "Registered Portfolio Managers",
        "Self-Certified Syndicate Banks under the direct ASBA facility (equity issuances)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub output: OutputConfig,
    pub workflow: WorkflowConfig,
    pub scraper: ScraperConfig,
    pub extractor: ExtractorConfig,
    pub analyzer: SanitizedAnalyzerConfig,
}

/// Sanitized analyzer config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAnalyzerConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub api_key_configured: bool,
    pub max_content_chars: usize,
    pub temperature: f32,
    pub departments: usize,
    pub intermediaries: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let analyzer = &config.analyzer;
        Self {
            server: config.server.clone(),
            output: config.output.clone(),
            workflow: config.workflow.clone(),
            scraper: config.scraper.clone(),
            extractor: config.extractor.clone(),
            analyzer: SanitizedAnalyzerConfig {
                provider: analyzer.provider.as_str().to_string(),
                model: analyzer.model.clone(),
                api_base: analyzer.api_base.clone(),
                api_key_configured: analyzer
                    .api_key
                    .as_ref()
                    .is_some_and(|key| !key.is_empty()),
                max_content_chars: analyzer.max_content_chars,
                temperature: analyzer.temperature,
                departments: analyzer.departments.len(),
                intermediaries: analyzer.intermediaries.len(),
            },
        }
    }
}
