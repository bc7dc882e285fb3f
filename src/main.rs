mod activity;
mod command;
mod config;
mod llm;
mod platform;
mod relay;
mod state;
mod translate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::activity::ActivityLog;
use crate::config::Config;
use crate::llm::LlmClient;
use crate::relay::Relay;
use crate::state::ChatState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Provider: {}", config.llm.provider);
    info!("  Model: {}", config.llm.model);
    info!("  Debounce: {} ms", config.relay.debounce_ms);

    let activity = Arc::new(ActivityLog::open(&config.relay.activity_log).await);
    let llm = Arc::new(LlmClient::new(config.llm.clone()));
    let relay = Arc::new(Relay::new(
        ChatState::new(config.relay.debounce_window()),
        llm,
        activity.clone(),
    ));

    let bot = teloxide::Bot::new(&config.telegram.bot_token);

    info!("Bot is starting...");
    platform::telegram::run(relay, bot).await?;

    activity.flush().await;
    info!("Bot stopped");

    Ok(())
}
