use std::env;
use std::sync::Arc;

use teloxide::{prelude::*, utils::command::BotCommands};

mod availability;
mod booking;
mod bot_state;
mod config;
mod database;
mod error;
mod handlers;
mod models;
mod sheets;

use crate::bot_state::BotState;
use crate::config::Config;
use crate::database::Database;
use crate::handlers::{callback_handler, command_handler, message_handler};
use crate::sheets::SheetsMirror;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "показать помощь")]
    Help,
    #[command(description = "панель администратора")]
    Admin,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting salon booking bot...");

    // Configuration problems are fatal before anything else starts.
    let config = Arc::new(Config::from_env()?);

    let database_url = env::var("DATABASE_URL")?;
    let db = Database::new(&database_url).await?;
    db.init().await?;
    log::info!("✅ Database initialized");

    let (events_tx, events_rx) = booking::event_channel();
    let state = BotState::new(db, config.clone(), events_tx);
    let mirror = config.sheet.as_ref().map(|c| Arc::new(SheetsMirror::new(c)));
    if mirror.is_none() {
        log::warn!("Google Sheets mirror is not configured, running without it");
    }

    let bot = Bot::from_env();

    tokio::spawn(handlers::events_task(
        bot.clone(),
        state.clone(),
        mirror.clone(),
        events_rx,
    ));
    tokio::spawn(handlers::reminders_task(bot.clone(), state.clone()));
    if let Some(mirror) = mirror.clone() {
        tokio::spawn(handlers::sheet_sync_task(state.clone(), mirror));
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, mirror])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
