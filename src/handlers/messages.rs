use std::error::Error;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::booking;
use crate::bot_state::BotState;
use crate::error::BookingError;
use crate::handlers::utils::{
    format_appointment_block, main_menu_keyboard, prompt_step, show_my_bookings, BTN_ABOUT,
    BTN_ADMIN_ACTIVE, BTN_ADMIN_ALL, BTN_ADMIN_EXPORT, BTN_ADMIN_SYNC, BTN_BOOK, BTN_MY_BOOKINGS,
};
use crate::models::session::{normalize_phone, resolve_booking_date, validate_name};
use crate::models::{Appointment, AppointmentStatus, BookingSession, BookingStep};
use crate::sheets::SheetsMirror;
use std::sync::Arc;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: BotState,
    mirror: Option<Arc<SheetsMirror>>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "👋 Выберите действие в меню:")
            .reply_markup(main_menu_keyboard())
            .await?;
        return Ok(());
    };

    // Admin cancel of an arbitrary appointment: /cancel_<id>. Other
    // commands were already consumed by the command handler.
    if let Some(id_raw) = text.strip_prefix("/cancel_") {
        if state.is_admin(chat_id) {
            admin_cancel(&bot, &state, chat_id, id_raw).await?;
        }
        return Ok(());
    }
    if text.starts_with('/') {
        return Ok(());
    }

    match text {
        BTN_BOOK => {
            // A new flow overwrites any session left behind.
            let mut session = BookingSession::new();
            prompt_step(&bot, &state, chat_id, &mut session).await?;
            state.set_session(chat_id, session).await;
        }
        BTN_MY_BOOKINGS => {
            show_my_bookings(&bot, chat_id, &state).await?;
        }
        BTN_ABOUT => {
            let cfg = &state.config;
            bot.send_message(
                chat_id,
                format!(
                    "💈 Наш салон красоты\n\n\
                     🕒 Часы работы: {}:00 - {}:00\n\
                     📍 Адрес: {}\n\
                     📱 Телефон: {}\n\n\
                     Мы предлагаем широкий спектр услуг по уходу за ногтями и кожей рук.",
                    cfg.work_start, cfg.work_end, cfg.salon_address, cfg.salon_phone
                ),
            )
            .await?;
        }
        BTN_ADMIN_ACTIVE if state.is_admin(chat_id) => {
            admin_list(&bot, &state, chat_id, Some(AppointmentStatus::Active)).await?;
        }
        BTN_ADMIN_ALL if state.is_admin(chat_id) => {
            admin_list(&bot, &state, chat_id, None).await?;
        }
        BTN_ADMIN_EXPORT if state.is_admin(chat_id) => {
            admin_export(&bot, &state, chat_id).await?;
        }
        BTN_ADMIN_SYNC if state.is_admin(chat_id) => {
            admin_sync(&bot, &state, chat_id, mirror).await?;
        }
        _ => {
            handle_session_text(&bot, &state, chat_id, text).await?;
        }
    }
    Ok(())
}

/// Free-text input routed by the session's current step. Name, phone, and
/// date are the only steps that accept text; everything else re-prompts
/// without advancing.
async fn handle_session_text(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    text: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(mut session) = state.session(chat_id).await else {
        bot.send_message(chat_id, "👋 Выберите действие в меню:")
            .reply_markup(main_menu_keyboard())
            .await?;
        return Ok(());
    };

    match session.step {
        BookingStep::EnteringName => match validate_name(text) {
            Some(name) => {
                session.client_name = Some(name);
                session.step = BookingStep::EnteringPhone;
                prompt_step(bot, state, chat_id, &mut session).await?;
            }
            None => {
                bot.send_message(chat_id, "❌ Имя должно быть от 2 до 50 символов.")
                    .await?;
                prompt_step(bot, state, chat_id, &mut session).await?;
            }
        },
        BookingStep::EnteringPhone => match normalize_phone(text) {
            Some(phone) => {
                session.phone = Some(phone);
                session.step = BookingStep::SelectingDate;
                prompt_step(bot, state, chat_id, &mut session).await?;
            }
            None => {
                bot.send_message(
                    chat_id,
                    "❌ Неверный формат телефона. Пример: +79161234567 или 89161234567",
                )
                .await?;
                prompt_step(bot, state, chat_id, &mut session).await?;
            }
        },
        BookingStep::SelectingDate => match resolve_booking_date(text, state.config.today()) {
            Some(date) => {
                session.date = Some(date);
                session.step = BookingStep::SelectingTime;
                prompt_step(bot, state, chat_id, &mut session).await?;
            }
            None => {
                bot.send_message(chat_id, "❌ Неверная дата! Используйте формат ДД.ММ")
                    .await?;
                prompt_step(bot, state, chat_id, &mut session).await?;
            }
        },
        _ => {
            // Steps driven by buttons: arbitrary text is a no-op re-prompt.
            prompt_step(bot, state, chat_id, &mut session).await?;
        }
    }

    state.set_session(chat_id, session).await;
    Ok(())
}

async fn admin_cancel(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    id_raw: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Ok(appointment_id) = id_raw.trim().parse::<i64>() else {
        bot.send_message(chat_id, "❌ Используйте: /cancel_ID").await?;
        return Ok(());
    };

    match booking::cancel(state, appointment_id, chat_id.0, true).await {
        Ok(view) => {
            bot.send_message(chat_id, format!("✅ Запись #{} отменена", appointment_id))
                .await?;
            // The client learns about an admin cancellation right away.
            let notice = format!(
                "❗ Ваша запись на {} в {} отменена администратором",
                view.formatted_date(),
                view.formatted_time()
            );
            if let Err(e) = bot.send_message(ChatId(view.client_id), notice).await {
                log::error!("Failed to notify client {}: {}", view.client_id, e);
            }
        }
        Err(BookingError::NotFound) => {
            bot.send_message(chat_id, "❌ Запись не найдена или уже отменена")
                .await?;
        }
        Err(e) => {
            log::error!("Admin cancel of #{} failed: {}", appointment_id, e);
            bot.send_message(chat_id, "⚠️ Ошибка отмены записи. Попробуйте позже.")
                .await?;
        }
    }
    Ok(())
}

async fn admin_list(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    status: Option<AppointmentStatus>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let appointments = match Appointment::list_all(&state.db.pool, status).await {
        Ok(appointments) => appointments,
        Err(e) => {
            log::error!("Error listing appointments: {}", e);
            bot.send_message(chat_id, "⚠️ Не удалось загрузить записи.")
                .await?;
            return Ok(());
        }
    };

    if appointments.is_empty() {
        bot.send_message(chat_id, "Записей нет").await?;
        return Ok(());
    }

    let mut response = String::from("📋 Записи:\n\n");
    for view in &appointments {
        response.push_str(&format_appointment_block(view));
    }
    bot.send_message(chat_id, response).await?;
    Ok(())
}

/// Read-only tabular dump of all appointments, sent as a CSV document.
async fn admin_export(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let appointments = match Appointment::list_all(&state.db.pool, None).await {
        Ok(appointments) => appointments,
        Err(e) => {
            log::error!("Error exporting appointments: {}", e);
            bot.send_message(chat_id, "⚠️ Ошибка при экспорте.").await?;
            return Ok(());
        }
    };

    if appointments.is_empty() {
        bot.send_message(chat_id, "Нет записей для экспорта").await?;
        return Ok(());
    }

    let mut csv = String::from("ID;Дата;Время;Клиент;Телефон;Мастер;Услуга;Статус\n");
    for view in &appointments {
        csv.push_str(&format!(
            "{};{};{};{};{};{};{};{}\n",
            view.id,
            view.formatted_date(),
            view.formatted_time(),
            view.client_name,
            view.phone,
            view.master_name,
            view.service_name,
            view.status().label(),
        ));
    }

    let filename = format!(
        "schedule_{}.csv",
        state.config.now().format("%Y%m%d_%H%M%S")
    );
    let document = InputFile::memory(csv.into_bytes()).file_name(filename);
    bot.send_document(chat_id, document).await?;
    Ok(())
}

async fn admin_sync(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    mirror: Option<Arc<SheetsMirror>>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(mirror) = mirror else {
        bot.send_message(chat_id, "ℹ️ Синхронизация с Google не настроена")
            .await?;
        return Ok(());
    };

    match Appointment::list_all(&state.db.pool, None).await {
        Ok(appointments) => match mirror.resync(&appointments).await {
            Ok(()) => {
                bot.send_message(chat_id, "✅ Google Sheets успешно синхронизирована")
                    .await?;
            }
            Err(e) => {
                log::error!("Manual sheet resync failed: {}", e);
                bot.send_message(chat_id, format!("❌ Ошибка синхронизации: {}", e))
                    .await?;
            }
        },
        Err(e) => {
            log::error!("Error loading snapshot for resync: {}", e);
            bot.send_message(chat_id, "⚠️ Не удалось загрузить записи.")
                .await?;
        }
    }
    Ok(())
}
