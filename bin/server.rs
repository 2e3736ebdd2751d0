// Reward Points - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use reward_points::api::{router, AppState};
use reward_points::{init_logging, InMemorySource, RewardConfig, RewardService, SqliteSource, TransactionSource};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    // Configuration is loaded once; an invalid one stops startup
    let config = match env::var_os("REWARD_CONFIG") {
        Some(path) => RewardConfig::from_file(&path)?,
        None => RewardConfig::default(),
    };
    tracing::info!(?config, "reward configuration loaded");

    let source: Arc<dyn TransactionSource> = match env::var_os("REWARD_DB") {
        Some(path) => {
            tracing::info!(path = ?path, "using SQLite transaction source");
            Arc::new(SqliteSource::open(&path)?)
        }
        None => {
            tracing::warn!("REWARD_DB not set, serving built-in sample transactions");
            Arc::new(InMemorySource::sample())
        }
    };

    let state = AppState {
        service: RewardService::new(source, config)?,
    };
    let app = router(state);

    let addr = env::var("REWARD_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {addr}"))?;

    tracing::info!(%addr, version = reward_points::VERSION, "reward server listening");

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
