use std::error::Error;
use teloxide::prelude::*;

use crate::bot_state::BotState;
use crate::handlers::utils::{admin_menu_keyboard, main_menu_keyboard};
use crate::Command;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await?,
        Command::Help => handle_help(bot, msg).await?,
        Command::Admin => handle_admin(bot, msg, state).await?,
    }
    Ok(())
}

async fn handle_start(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    // /start always resets a booking in progress.
    state.clear_session(msg.chat.id).await;
    bot.send_message(
        msg.chat.id,
        "👋 Добро пожаловать в наш салон красоты!\nВыберите действие:",
    )
    .reply_markup(main_menu_keyboard())
    .await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.send_message(
        msg.chat.id,
        "🫂 Помощь по боту\n\n\
         /start - главное меню (сбрасывает текущую запись)\n\
         /help - эта справка\n\n\
         📅 Записаться - пошаговая запись: мастер, услуга, имя, телефон, дата, время\n\
         📋 Мои записи - просмотр и отмена активных записей\n\
         ℹ️ О салоне - часы работы и контакты",
    )
    .reply_markup(main_menu_keyboard())
    .await?;
    Ok(())
}

async fn handle_admin(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !state.is_admin(msg.chat.id) {
        bot.send_message(msg.chat.id, "⛔ Доступ запрещен").await?;
        return Ok(());
    }
    bot.send_message(msg.chat.id, "Админ-панель:")
        .reply_markup(admin_menu_keyboard())
        .await?;
    Ok(())
}
