use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use nl2sql::config::{AppConfig, CliArgs};
use nl2sql::embedding;
use nl2sql::llm::LlmManager;
use nl2sql::schema::bootstrap::seed_sample_schema;
use nl2sql::util::logging::init_tracing;
use nl2sql::web::{self, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm = Arc::new(LlmManager::new(&config.llm)?);

    info!("Initializing embedder with backend: {}", config.embedding.backend);
    let embedder = embedding::from_config(&config.embedding)?;

    let app_state = Arc::new(AppState::new(&config, llm, embedder));

    if config.schema.seed_sample_data {
        if let Err(e) = seed_sample_schema(&app_state.catalog).await {
            // the server is still usable; tables can be registered over the API
            error!("Failed to seed sample schema: {}", e);
        }
    }

    info!("Starting NL2SQL server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
