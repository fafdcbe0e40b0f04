pub mod callbacks;
pub mod commands;
pub mod messages;
pub mod utils;

pub use callbacks::callback_handler;
pub use commands::command_handler;
pub use messages::message_handler;

use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use tokio::time;

use crate::booking::{self, BookingEvent, EventReceiver};
use crate::bot_state::BotState;
use crate::models::{Appointment, AppointmentView};
use crate::sheets::SheetsMirror;

const REMINDER_INTERVAL: Duration = Duration::from_secs(3600);
const SHEET_SYNC_INTERVAL: Duration = Duration::from_secs(600);
/// Morning reminders for same-day appointments go out before this hour.
const MORNING_CUTOFF_HOUR: u32 = 10;

/// Fans committed booking changes out to the admin chats and the sheet
/// mirror. Both sinks are best-effort: a failure is logged and the event is
/// dropped, never replayed into the store.
pub async fn events_task(
    bot: Bot,
    state: BotState,
    mirror: Option<Arc<SheetsMirror>>,
    mut events: EventReceiver,
) {
    while let Some(event) = events.recv().await {
        match event {
            BookingEvent::Created(view) => {
                let text = format!(
                    "📝 Новая запись! (#{})\n\
                     👤 Клиент: {}\n\
                     📱 Тел: {}\n\
                     👩‍🎨 Мастер: {}\n\
                     💅 Услуга: {}\n\
                     📅 {} {}",
                    view.id,
                    view.client_name,
                    view.phone,
                    view.master_name,
                    view.service_name,
                    view.formatted_date(),
                    view.formatted_time(),
                );
                notify_admins(&bot, &state, &text).await;
                if let Some(mirror) = &mirror {
                    if let Err(e) = mirror.append(&view).await {
                        log::error!("Sheet append for #{} failed: {}", view.id, e);
                    }
                }
            }
            BookingEvent::Canceled(view) => {
                let text = format!(
                    "❌ Запись #{} отменена\n\
                     Дата: {} {}\n\
                     ID клиента: {}",
                    view.id,
                    view.formatted_date(),
                    view.formatted_time(),
                    view.client_id,
                );
                notify_admins(&bot, &state, &text).await;
                if let Some(mirror) = &mirror {
                    if let Err(e) = mirror.update(&view).await {
                        log::error!("Sheet update for #{} failed: {}", view.id, e);
                    }
                }
            }
        }
    }
}

async fn notify_admins(bot: &Bot, state: &BotState, text: &str) {
    for admin_id in &state.config.admin_chat_ids {
        if let Err(e) = bot.send_message(ChatId(*admin_id), text).await {
            log::error!("Failed to notify admin {}: {}", admin_id, e);
        }
    }
}

/// Hourly reminder loop: appointments for tomorrow, plus today's in the
/// morning. Each reminder is sent once; a client who blocked the bot gets
/// their appointment canceled instead of endless retries.
pub async fn reminders_task(bot: Bot, state: BotState) {
    let mut interval = time::interval(REMINDER_INTERVAL);
    loop {
        interval.tick().await;

        let now = state.config.now();
        let tomorrow = now.date_naive() + chrono::Duration::days(1);
        send_day_reminders(&bot, &state, tomorrow, "завтра").await;

        if now.hour() < MORNING_CUTOFF_HOUR {
            send_day_reminders(&bot, &state, now.date_naive(), "сегодня").await;
        }
    }
}

async fn send_day_reminders(bot: &Bot, state: &BotState, date: chrono::NaiveDate, day_word: &str) {
    let due = match Appointment::due_reminders(&state.db.pool, date).await {
        Ok(due) => due,
        Err(e) => {
            log::error!("Error fetching reminders for {}: {}", date, e);
            return;
        }
    };

    for view in due {
        match bot
            .send_message(ChatId(view.client_id), reminder_text(&view, day_word, state))
            .await
        {
            Ok(_) => {
                if let Err(e) = Appointment::mark_reminder_sent(&state.db.pool, view.id).await {
                    log::error!("Failed to mark reminder #{} sent: {}", view.id, e);
                }
                log::info!("Reminder for #{} sent to {}", view.id, view.client_id);
            }
            Err(RequestError::Api(ApiError::BotBlocked)) => {
                log::warn!(
                    "Client {} blocked the bot, canceling appointment #{}",
                    view.client_id,
                    view.id
                );
                if let Err(e) = booking::cancel(state, view.id, view.client_id, true).await {
                    log::error!("Failed to cancel #{} for blocked client: {}", view.id, e);
                }
            }
            Err(e) => {
                log::error!("Failed to send reminder #{}: {}", view.id, e);
            }
        }
    }
}

fn reminder_text(view: &AppointmentView, day_word: &str, state: &BotState) -> String {
    format!(
        "⏰ Напоминание о записи!\n\n\
         Здравствуйте, {}!\n\
         {} в {} у вас запись к мастеру {}\n\
         Услуга: {}\n\n\
         📍 Адрес: {}\n\
         📱 Контакты: {}\n\n\
         Если не можете прийти, отмените запись через меню «📋 Мои записи»",
        view.client_name,
        capitalize(day_word),
        view.formatted_time(),
        view.master_name,
        view.service_name,
        state.config.salon_address,
        state.config.salon_phone,
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Periodic full resync of the sheet mirror from the store snapshot.
pub async fn sheet_sync_task(state: BotState, mirror: Arc<SheetsMirror>) {
    let mut interval = time::interval(SHEET_SYNC_INTERVAL);
    loop {
        interval.tick().await;

        match Appointment::list_all(&state.db.pool, None).await {
            Ok(snapshot) => {
                if let Err(e) = mirror.resync(&snapshot).await {
                    log::error!("Periodic sheet resync failed: {}", e);
                } else {
                    log::debug!("Sheet resync done: {} rows", snapshot.len());
                }
            }
            Err(e) => log::error!("Error loading snapshot for resync: {}", e),
        }
    }
}
