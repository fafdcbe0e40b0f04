use std::error::Error;

use chrono::{NaiveDate, NaiveTime};
use teloxide::prelude::*;

use crate::booking;
use crate::bot_state::BotState;
use crate::error::BookingError;
use crate::handlers::utils::{current_slots, main_menu_keyboard, prompt_step, show_my_bookings};
use crate::models::{BookingStep, Master, Service};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;

    bot.answer_callback_query(q.id.clone()).await?;

    // Cancellation buttons live outside the booking flow.
    if let Some(id_raw) = data.strip_prefix("cancel:") {
        handle_cancel(&bot, &state, chat_id, id_raw).await?;
        return Ok(());
    }

    let Some(mut session) = state.session(chat_id).await else {
        // A button from a finished flow: nothing to resume.
        bot.send_message(chat_id, "👋 Выберите действие в меню:")
            .reply_markup(main_menu_keyboard())
            .await?;
        return Ok(());
    };

    if data == "back" {
        if session.step_back() {
            prompt_step(&bot, &state, chat_id, &mut session).await?;
            state.set_session(chat_id, session).await;
        } else {
            state.clear_session(chat_id).await;
            bot.send_message(chat_id, "❌ Запись отменена")
                .reply_markup(main_menu_keyboard())
                .await?;
        }
        return Ok(());
    }

    match (session.step, data.split_once(':')) {
        (BookingStep::SelectingMaster, Some(("master", id_raw))) => {
            let master = match id_raw.parse::<i32>() {
                Ok(id) => Master::find_active(&state.db.pool, id).await,
                Err(_) => None,
            };
            match master {
                Some(master) => {
                    session.master_id = Some(master.id);
                    session.master_name = Some(master.name);
                    session.step = BookingStep::SelectingService;
                }
                None => {
                    bot.send_message(chat_id, "❌ Пожалуйста, выберите мастера из списка")
                        .await?;
                }
            }
            prompt_step(&bot, &state, chat_id, &mut session).await?;
        }
        (BookingStep::SelectingService, Some(("service", id_raw))) => {
            let service = match id_raw.parse::<i32>() {
                Ok(id) => Service::find_active(&state.db.pool, id).await,
                Err(_) => None,
            };
            match service {
                Some(service) => {
                    session.service_id = Some(service.id);
                    session.service_name = Some(service.name.clone());
                    session.duration_minutes = Some(service.duration);
                    session.price = Some(service.price);
                    session.step = BookingStep::EnteringName;
                }
                None => {
                    bot.send_message(chat_id, "❌ Пожалуйста, выберите услугу из списка")
                        .await?;
                }
            }
            prompt_step(&bot, &state, chat_id, &mut session).await?;
        }
        (BookingStep::SelectingDate, Some(("date", date_raw))) => {
            let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d").ok();
            match date.filter(|d| *d >= state.config.today()) {
                Some(date) => {
                    session.date = Some(date);
                    session.step = BookingStep::SelectingTime;
                }
                None => {
                    bot.send_message(chat_id, "❌ Нельзя выбрать прошедшую дату")
                        .await?;
                }
            }
            prompt_step(&bot, &state, chat_id, &mut session).await?;
        }
        (BookingStep::SelectingTime, Some(("time", time_raw))) => {
            // The selection must exactly match a currently free candidate:
            // stale buttons from before someone else booked are rejected.
            let slots = current_slots(&state, &session).await?;
            let chosen = NaiveTime::parse_from_str(time_raw, "%H:%M")
                .ok()
                .filter(|t| slots.contains(t));
            match chosen {
                Some(time) => {
                    session.time = Some(time);
                    session.step = BookingStep::Confirming;
                }
                None => {
                    bot.send_message(chat_id, "❌ Это время уже занято, выберите другое")
                        .await?;
                }
            }
            prompt_step(&bot, &state, chat_id, &mut session).await?;
        }
        (BookingStep::Confirming, Some(("confirm", answer))) => {
            match answer {
                "yes" => {
                    handle_confirm(&bot, &state, chat_id, session).await?;
                    return Ok(());
                }
                "no" => {
                    state.clear_session(chat_id).await;
                    bot.send_message(chat_id, "❌ Запись отменена")
                        .reply_markup(main_menu_keyboard())
                        .await?;
                    return Ok(());
                }
                _ => {
                    prompt_step(&bot, &state, chat_id, &mut session).await?;
                }
            }
        }
        _ => {
            // Payload from another step (stale keyboard): re-prompt, never
            // advance or touch captured fields.
            prompt_step(&bot, &state, chat_id, &mut session).await?;
        }
    }

    state.set_session(chat_id, session).await;
    Ok(())
}

async fn handle_confirm(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    session: crate::models::BookingSession,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(request) = session.clone().into_request(chat_id.0) else {
        log::error!("Session for {} reached confirm with missing fields", chat_id);
        state.clear_session(chat_id).await;
        bot.send_message(chat_id, "⚠️ Произошла ошибка. Пожалуйста, начните заново.")
            .reply_markup(main_menu_keyboard())
            .await?;
        return Ok(());
    };

    match booking::submit(state, request).await {
        Ok(_) => {
            state.clear_session(chat_id).await;
            bot.send_message(chat_id, "🎉 Запись успешно сохранена! Ждем вас в салоне.")
                .reply_markup(main_menu_keyboard())
                .await?;
        }
        Err(BookingError::Conflict) => {
            // Someone booked the slot while we confirmed: back to slot
            // selection with fresh candidates.
            let mut session = session;
            session.time = None;
            session.step = BookingStep::SelectingTime;
            bot.send_message(
                chat_id,
                "❌ Это время стало занято, пока вы подтверждали. Выберите другое:",
            )
            .await?;
            prompt_step(bot, state, chat_id, &mut session).await?;
            state.set_session(chat_id, session).await;
        }
        Err(BookingError::Validation(reason)) => {
            log::warn!("Validation failure for {}: {}", chat_id, reason);
            let mut session = session;
            session.time = None;
            session.step = BookingStep::SelectingTime;
            bot.send_message(chat_id, format!("❌ {}", reason)).await?;
            prompt_step(bot, state, chat_id, &mut session).await?;
            state.set_session(chat_id, session).await;
        }
        Err(e) => {
            // Transient store failure: the session survives so the client
            // can simply confirm again.
            log::error!("Error committing booking for {}: {}", chat_id, e);
            bot.send_message(
                chat_id,
                "⚠️ Ошибка при сохранении записи. Попробуйте еще раз.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_cancel(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    id_raw: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Ok(appointment_id) = id_raw.parse::<i64>() else {
        return Ok(());
    };

    match booking::cancel(state, appointment_id, chat_id.0, state.is_admin(chat_id)).await {
        Ok(view) => {
            bot.send_message(
                chat_id,
                format!(
                    "❌ Ваша запись на {} в {} отменена",
                    view.formatted_date(),
                    view.formatted_time()
                ),
            )
            .await?;
            show_my_bookings(bot, chat_id, state).await?;
        }
        Err(BookingError::NotFound) => {
            bot.send_message(chat_id, "❌ Запись не найдена или уже отменена")
                .await?;
        }
        Err(BookingError::Forbidden) => {
            bot.send_message(chat_id, "❌ Это не ваша запись").await?;
        }
        Err(e) => {
            log::error!("Error canceling #{} for {}: {}", appointment_id, chat_id, e);
            bot.send_message(chat_id, "⚠️ Ошибка при отмене записи. Попробуйте позже.")
                .await?;
        }
    }
    Ok(())
}
