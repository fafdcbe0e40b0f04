use chrono::{Duration, NaiveDate, NaiveTime};
use std::error::Error;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ParseMode,
    ReplyMarkup,
};

use crate::availability::available_slots;
use crate::bot_state::BotState;
use crate::models::service::format_duration;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, BookingSession, BookingStep, Master, Service,
};

pub const BTN_BOOK: &str = "📅 Записаться";
pub const BTN_MY_BOOKINGS: &str = "📋 Мои записи";
pub const BTN_ABOUT: &str = "ℹ️ О салоне";

pub const BTN_ADMIN_ACTIVE: &str = "Активные записи";
pub const BTN_ADMIN_ALL: &str = "Все записи";
pub const BTN_ADMIN_EXPORT: &str = "Экспорт CSV";
pub const BTN_ADMIN_SYNC: &str = "Синхронизировать с Google";

/// Экранирование MarkdownV2
pub fn escape_markdown_v2(text: &str) -> String {
    let specials = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut out = String::with_capacity(text.len() * 2);

    for ch in text.chars() {
        if specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Главное меню
pub fn main_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![KeyboardButton::new(BTN_BOOK)],
            vec![KeyboardButton::new(BTN_MY_BOOKINGS)],
            vec![KeyboardButton::new(BTN_ABOUT)],
        ])
        .resize_keyboard(),
    )
}

pub fn admin_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![
                KeyboardButton::new(BTN_ADMIN_ACTIVE),
                KeyboardButton::new(BTN_ADMIN_ALL),
            ],
            vec![
                KeyboardButton::new(BTN_ADMIN_EXPORT),
                KeyboardButton::new(BTN_ADMIN_SYNC),
            ],
        ])
        .resize_keyboard(),
    )
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback("↩️ Назад", "back")]
}

/// Selection keyboards carry stable ids in the callback payload, never the
/// label text.
pub fn masters_keyboard(masters: &[Master]) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = masters
        .iter()
        .map(|m| {
            vec![InlineKeyboardButton::callback(
                format!("Мастер {}", m.name),
                format!("master:{}", m.id),
            )]
        })
        .collect();
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn services_keyboard(services: &[Service]) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = services
        .iter()
        .map(|s| {
            vec![InlineKeyboardButton::callback(
                s.label(),
                format!("service:{}", s.id),
            )]
        })
        .collect();
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

/// The next seven days, labeled ДД.ММ.
pub fn dates_keyboard(today: NaiveDate) -> InlineKeyboardMarkup {
    let mut keyboard = Vec::new();
    let mut row = Vec::new();
    for i in 0..7 {
        let date = today + Duration::days(i);
        row.push(InlineKeyboardButton::callback(
            date.format("%d.%m").to_string(),
            format!("date:{}", date.format("%Y-%m-%d")),
        ));
        if row.len() == 4 {
            keyboard.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        keyboard.push(row);
    }
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn times_keyboard(slots: &[NaiveTime]) -> InlineKeyboardMarkup {
    let mut keyboard = Vec::new();
    let mut row = Vec::new();
    for slot in slots {
        let label = slot.format("%H:%M").to_string();
        row.push(InlineKeyboardButton::callback(
            label.clone(),
            format!("time:{}", label),
        ));
        if row.len() == 4 {
            keyboard.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        keyboard.push(row);
    }
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✅ Да, подтверждаю", "confirm:yes")],
        vec![InlineKeyboardButton::callback("❌ Отменить запись", "confirm:no")],
        back_row(),
    ])
}

/// Booking summary shown at the confirmation step.
pub fn booking_summary(session: &BookingSession) -> String {
    let date = session
        .date
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_default();
    let time = session
        .time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();
    format!(
        "✅ Подтвердите запись:\n\n\
         👩‍🎨 Мастер: {}\n\
         💅 Услуга: {} - {}₽\n\
         ⏱ Длительность: {}\n\
         📅 Дата: {}\n\
         ⏰ Время: {}\n\
         👤 Имя: {}\n\
         📱 Телефон: {}",
        session.master_name.as_deref().unwrap_or(""),
        session.service_name.as_deref().unwrap_or(""),
        session.price.unwrap_or(0.0),
        format_duration(session.duration_minutes.unwrap_or(0)),
        date,
        time,
        session.client_name.as_deref().unwrap_or(""),
        session.phone.as_deref().unwrap_or(""),
    )
}

/// Sends the prompt for the session's current step. The same function
/// serves first entry into a step and every re-prompt after invalid input.
///
/// When the chosen day has no free slots the session is sent back to date
/// selection, so `session` may be mutated; the caller persists it after.
pub async fn prompt_step(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    session: &mut BookingSession,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match session.step {
        BookingStep::SelectingMaster => {
            let masters = Master::all_active(&state.db.pool).await;
            if masters.is_empty() {
                bot.send_message(chat_id, "❌ В данный момент нет доступных мастеров")
                    .reply_markup(main_menu_keyboard())
                    .await?;
                return Ok(());
            }
            bot.send_message(chat_id, "👩‍🎨 Выберите мастера:")
                .reply_markup(masters_keyboard(&masters))
                .await?;
        }
        BookingStep::SelectingService => {
            let services = Service::all_active(&state.db.pool).await;
            if services.is_empty() {
                bot.send_message(chat_id, "❌ В данный момент нет доступных услуг")
                    .reply_markup(main_menu_keyboard())
                    .await?;
                return Ok(());
            }
            bot.send_message(chat_id, "💅 Выберите услугу:")
                .reply_markup(services_keyboard(&services))
                .await?;
        }
        BookingStep::EnteringName => {
            bot.send_message(chat_id, "📝 Введите ваше имя:").await?;
        }
        BookingStep::EnteringPhone => {
            bot.send_message(chat_id, "📱 Введите ваш телефон (пример: +79161234567):")
                .await?;
        }
        BookingStep::SelectingDate => {
            bot.send_message(chat_id, "📅 Выберите дату (или введите ДД.ММ):")
                .reply_markup(dates_keyboard(state.config.today()))
                .await?;
        }
        BookingStep::SelectingTime => {
            let slots = current_slots(state, session).await?;
            if slots.is_empty() {
                session.step = BookingStep::SelectingDate;
                bot.send_message(chat_id, "😢 На этот день нет свободных слотов")
                    .await?;
                bot.send_message(chat_id, "📅 Выберите другую дату:")
                    .reply_markup(dates_keyboard(state.config.today()))
                    .await?;
                return Ok(());
            }
            bot.send_message(chat_id, "⏰ Выберите время:")
                .reply_markup(times_keyboard(&slots))
                .await?;
        }
        BookingStep::Confirming => {
            bot.send_message(chat_id, booking_summary(session))
                .reply_markup(confirm_keyboard())
                .await?;
        }
    }
    Ok(())
}

/// Free start times for the session's master/date/duration. Returns an
/// empty list when the session is not yet far enough along.
pub async fn current_slots(
    state: &BotState,
    session: &BookingSession,
) -> Result<Vec<NaiveTime>, Box<dyn Error + Send + Sync>> {
    let (master_id, date, duration) = match (session.master_id, session.date, session.duration_minutes)
    {
        (Some(m), Some(d), Some(dur)) => (m, d, dur),
        _ => return Ok(Vec::new()),
    };

    let busy = Appointment::busy_intervals(&state.db.pool, master_id, date).await?;
    Ok(available_slots(
        state.slot_grid(),
        duration.max(0) as u32,
        date,
        state.config.now(),
        &busy,
    ))
}

/// Shows the client's active bookings with per-row cancel buttons.
pub async fn show_my_bookings(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let bookings =
        match Appointment::list_by_client(&state.db.pool, chat_id.0, AppointmentStatus::Active)
            .await
        {
            Ok(bookings) => bookings,
            Err(e) => {
                log::error!("Error listing bookings for {}: {}", chat_id, e);
                bot.send_message(chat_id, "⚠️ Не удалось загрузить записи. Попробуйте позже.")
                    .await?;
                return Ok(());
            }
        };

    if bookings.is_empty() {
        bot.send_message(chat_id, "📭 У вас нет активных записей")
            .await?;
        return Ok(());
    }

    let mut response = String::from("📋 *Ваши активные записи:*\n\n");
    let mut keyboard = Vec::new();
    for (idx, booking) in bookings.iter().enumerate() {
        response.push_str(&format!(
            "🔹 *Запись \\#{}*\n⏰ {} в {}\n👩‍🎨 Мастер: {}\n💅 Услуга: {}\n",
            idx + 1,
            escape_markdown_v2(&booking.formatted_date()),
            escape_markdown_v2(&booking.formatted_time()),
            escape_markdown_v2(&booking.master_name),
            escape_markdown_v2(&booking.service_name),
        ));
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("❌ Отменить запись #{}", idx + 1),
            format!("cancel:{}", booking.id),
        )]);
    }

    bot.send_message(chat_id, response)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(InlineKeyboardMarkup::new(keyboard))
        .await?;
    Ok(())
}

/// Plain-text block for admin listings.
pub fn format_appointment_block(view: &AppointmentView) -> String {
    format!(
        "🔹 #{} [{}]\n👤 {} | 📱 {}\n👩‍🎨 Мастер: {}\n💅 Услуга: {}\n⏰ {} в {}\n————————————————\n",
        view.id,
        view.status().label(),
        view.client_name,
        view.phone,
        view.master_name,
        view.service_name,
        view.formatted_date(),
        view.formatted_time(),
    )
}
