use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cats_ssr::cats::HttpCatApi;
use cats_ssr::config::{AppConfig, DEFAULT_LOG_FILTER};
use cats_ssr::server::{serve, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let api = HttpCatApi::new(config.api_url.clone()).context("Failed to create cat API client")?;
    info!(api_url = %config.api_url, "Using cat API");

    serve(AppState::new(Arc::new(api), config)).await
}
