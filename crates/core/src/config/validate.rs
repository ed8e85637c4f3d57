use super::{
    types::{AnalyzerProvider, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Output directory and artifact file names are set
/// - Scraper listing URL has a `{page}` placeholder and the link pattern compiles
/// - Extractor has at least one way to produce text
/// - Analyzer limits are sane and Anthropic has an API key
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Output validation
    if config.output.dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "output.dir cannot be empty".to_string(),
        ));
    }
    if config.output.scraping_metadata_file.trim().is_empty()
        || config.output.analysis_results_file.trim().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "output artifact file names cannot be empty".to_string(),
        ));
    }
    if config.output.scraping_metadata_file == config.output.analysis_results_file {
        return Err(ConfigError::ValidationError(
            "output.scraping_metadata_file and output.analysis_results_file must differ"
                .to_string(),
        ));
    }

    // Scraper validation
    if !config.scraper.listing_url.contains("{page}") {
        return Err(ConfigError::ValidationError(
            "scraper.listing_url must contain a {page} placeholder".to_string(),
        ));
    }
    if let Some(pattern) = &config.scraper.detail_link_pattern {
        regex_lite::Regex::new(pattern).map_err(|e| {
            ConfigError::ValidationError(format!("scraper.detail_link_pattern is invalid: {}", e))
        })?;
    }

    // Extractor validation
    if config.extractor.commands.is_empty() && !config.extractor.plain_text_fallback {
        return Err(ConfigError::ValidationError(
            "extractor needs at least one command or plain_text_fallback = true".to_string(),
        ));
    }
    if config
        .extractor
        .commands
        .iter()
        .any(|c| c.program.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "extractor command program cannot be empty".to_string(),
        ));
    }

    // Analyzer validation
    if config.analyzer.max_content_chars == 0 {
        return Err(ConfigError::ValidationError(
            "analyzer.max_content_chars cannot be 0".to_string(),
        ));
    }
    if config.analyzer.provider == AnalyzerProvider::Anthropic
        && config
            .analyzer
            .api_key
            .as_ref()
            .is_none_or(|key| key.is_empty())
    {
        return Err(ConfigError::ValidationError(
            "analyzer.api_key is required for the anthropic provider".to_string(),
        ));
    }

    Ok(())
}
