mod config;
mod gate;
mod llm;
mod platform;
mod prompt;
mod scheduler;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::gate::{GatePolicy, RequestGate};
use crate::llm::{CompletionBackend, LlmClient};
use crate::platform::telegram::TelegramChat;
use crate::platform::ChatOutbound;
use crate::scheduler::{tasks, Scheduler};
use crate::store::WordStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wordbot=debug".into()),
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
    info!("  Database: {}", config.store.database_path.display());
    info!("  Broadcast chat: {}", config.telegram.broadcast_chat_id);

    // Sequential startup: store, clients, gate, scheduled jobs, dispatcher
    let store = WordStore::open(&config.store.database_path)?;
    let llm: Arc<dyn CompletionBackend> = Arc::new(LlmClient::new(config.llm.clone()));
    let bot = Bot::new(&config.telegram.bot_token);
    let chat: Arc<dyn ChatOutbound> = Arc::new(TelegramChat::new(
        bot.clone(),
        config.telegram.broadcast_chat_id,
    ));

    let gate = Arc::new(RequestGate::new(
        llm.clone(),
        Arc::new(store.clone()),
        chat.clone(),
        GatePolicy {
            cooldown: Duration::from_secs(config.gate.cooldown_secs),
        },
    ));

    let scheduler = Scheduler::new().await?;
    tasks::register_builtin_tasks(&scheduler, &config, store, gate.clone(), llm, chat).await?;
    scheduler.start().await?;

    // Run the Telegram bot
    info!("Bot is starting...");
    platform::telegram::run(gate, bot).await?;

    Ok(())
}
