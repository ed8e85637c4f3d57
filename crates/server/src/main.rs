use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docket_core::{
    client_from_config, load_config, validate_config, Analyzer, ArtifactStore, CommandExtractor,
    Dispatcher, Extractor, HttpScraper, InMemoryTaskStore, LlmAnalyzer, Scraper, TaskStore,
    WorkflowRunner,
};
use docket_server::api::create_router;
use docket_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DOCKET_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Output directory: {:?}", config.output.dir);
    info!("Download root: {:?}", config.workflow.download_root);

    // Stage collaborators
    let scraper: Arc<dyn Scraper> = Arc::new(
        HttpScraper::new(config.scraper.clone()).context("Failed to create scraper")?,
    );
    info!("Using scraper: {} ({})", scraper.name(), config.scraper.base_url);

    let extractor: Arc<dyn Extractor> = Arc::new(CommandExtractor::new(config.extractor.clone()));
    info!(
        "Using extractor: {} ({} commands, plain text fallback: {})",
        extractor.name(),
        config.extractor.commands.len(),
        config.extractor.plain_text_fallback
    );

    let llm = client_from_config(&config.analyzer).context("Failed to create LLM client")?;
    let analyzer: Arc<dyn Analyzer> = Arc::new(LlmAnalyzer::new(llm, config.analyzer.clone()));
    info!(
        "Using analyzer: {} ({} / {})",
        analyzer.name(),
        config.analyzer.provider.as_str(),
        config.analyzer.model
    );

    // Task registry, runner and dispatcher
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let runner = Arc::new(WorkflowRunner::new(
        store,
        scraper,
        extractor,
        analyzer,
        ArtifactStore::new(&config.output),
        config.workflow.download_root.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(runner, &config.workflow));

    let addr = SocketAddr::new(config.server.host, config.server.port);

    // Create app state and router
    let state = Arc::new(AppState::new(config, dispatcher));
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Detached runs are dropped with the runtime; their records live only in memory.
    info!("Server shutting down...");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
