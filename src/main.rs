use std::sync::Arc;

use anyhow::Context;
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio_util::sync::CancellationToken;

mod bot_state;
mod config;
mod database;
mod dispatcher;
mod handlers;
mod models;
mod prices;
mod transport;
mod validation;

#[cfg(test)]
mod testing;

use crate::bot_state::BotState;
use crate::config::Config;
use crate::database::Database;
use crate::dispatcher::UpdateDispatcher;
use crate::prices::BinancePriceSource;
use crate::transport::{callback_endpoint, message_endpoint, TelegramTransport};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
enum Command {
    #[command(description = "open the main menu")]
    Start,
    #[command(description = "show service status")]
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Загружаем .env и инициализируем логирование
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting crypto portfolio bot...");

    let config = Config::from_env().context("failed to load configuration")?;

    let db = Database::new(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    db.init().await.context("failed to initialize schema")?;
    log::info!("✅ Database initialized");

    let prices = BinancePriceSource::new(&config.binance_api_url);
    let state = BotState::new(Arc::new(db), Arc::new(prices));

    let bot = Bot::new(&config.telegram_token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("⚠️ Failed to register bot commands: {}", e);
    }

    let shutdown = CancellationToken::new();
    let dispatcher = UpdateDispatcher::new(
        state,
        Arc::new(TelegramTransport::new(bot.clone())),
        shutdown.clone(),
    );

    // Сессии не переживают рестарт, старые кнопки станут устаревшими
    dispatcher.startup().await;
    let sweeper = dispatcher.spawn_sweeper(config.sweep_interval, config.session_ttl);

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(callback_endpoint))
        .branch(Update::filter_message().endpoint(message_endpoint));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        log::error!("❌ Session sweeper failed: {}", e);
    }
    log::info!("👋 Bot stopped");

    Ok(())
}
