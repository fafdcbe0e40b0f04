//! Booking orchestrator: commits validated requests, drives status
//! transitions, and emits change events for the notification and mirror
//! sinks.

use chrono::Timelike;
use tokio::sync::mpsc;

use crate::bot_state::BotState;
use crate::error::BookingError;
use crate::models::{Appointment, AppointmentStatus, AppointmentView, BookingRequest};

/// A committed change to the booking store. Consumers (admin notification,
/// spreadsheet mirror) receive the full denormalized record and are
/// best-effort: their failures are logged and never undo the commit.
#[derive(Debug, Clone)]
pub enum BookingEvent {
    Created(AppointmentView),
    Canceled(AppointmentView),
}

pub type EventSender = mpsc::UnboundedSender<BookingEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<BookingEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Commits a booking request.
///
/// Validates the interval against business hours, then inserts with the
/// overlap check re-run in the store's critical section. `Conflict` means
/// the slot was consumed since the client last saw it; the caller re-offers
/// slot selection.
pub async fn submit(state: &BotState, req: BookingRequest) -> Result<i64, BookingError> {
    let closing = state.config.work_end * 60;
    let end = req.time.hour() * 60 + req.time.minute() + req.duration_minutes.max(0) as u32;
    if end > closing {
        return Err(BookingError::Validation(
            "услуга не помещается в рабочее время".to_string(),
        ));
    }

    let id = Appointment::insert_checked(&state.db.pool, &req).await?;
    log::info!(
        "Appointment #{} committed: client {} master {} on {} at {}",
        id,
        req.client_id,
        req.master_id,
        req.date,
        req.time.format("%H:%M")
    );

    match Appointment::find_view(&state.db.pool, id).await {
        Ok(Some(view)) => state.emit(BookingEvent::Created(view)),
        Ok(None) => log::error!("Committed appointment #{} has no view row", id),
        Err(e) => log::error!("Error loading appointment #{} for events: {}", id, e),
    }

    Ok(id)
}

/// Cancels an appointment.
///
/// Clients may only cancel their own records; admins bypass the ownership
/// check. Canceling a missing or already-terminal appointment returns
/// `NotFound` without side effects.
pub async fn cancel(
    state: &BotState,
    appointment_id: i64,
    requester_id: i64,
    is_admin: bool,
) -> Result<AppointmentView, BookingError> {
    let expected_owner = if is_admin { None } else { Some(requester_id) };
    let view = Appointment::set_status(
        &state.db.pool,
        appointment_id,
        AppointmentStatus::Canceled,
        expected_owner,
    )
    .await?;

    log::info!(
        "Appointment #{} canceled by {} (admin: {})",
        appointment_id,
        requester_id,
        is_admin
    );
    state.emit(BookingEvent::Canceled(view.clone()));
    Ok(view)
}
