//! Appointments: the durable record of bookings and the only source of
//! truth for occupancy.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::availability::{conflicts, BusyInterval};
use crate::error::BookingError;

/// Status lifecycle. Transitions are one-directional: `Active` may become
/// `Canceled` or `Completed`; both of those are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Active,
    Canceled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Active => "active",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AppointmentStatus::Active),
            "canceled" => Some(AppointmentStatus::Canceled),
            "completed" => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }

    /// Human label used in lists and the spreadsheet mirror.
    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Active => "активна",
            AppointmentStatus::Canceled => "отменена",
            AppointmentStatus::Completed => "завершена",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub phone: String,
    pub master_id: i32,
    pub service_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub reminder_sent: bool,
}

/// A validated, fully populated request produced by the session state
/// machine and committed by the orchestrator.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub client_id: i64,
    pub client_name: String,
    pub phone: String,
    pub master_id: i32,
    pub service_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
}

/// Denormalized record for lists, notifications, and the mirror.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppointmentView {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub phone: String,
    pub master_name: String,
    pub service_name: String,
    pub duration: i32,
    pub price: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
}

impl AppointmentView {
    pub fn status(&self) -> AppointmentStatus {
        AppointmentStatus::parse(&self.status).unwrap_or(AppointmentStatus::Active)
    }

    pub fn formatted_date(&self) -> String {
        self.date.format("%d.%m.%Y").to_string()
    }

    pub fn formatted_time(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

const VIEW_SELECT: &str = "SELECT \
        a.id, a.client_id, a.client_name, a.phone, \
        m.name AS master_name, s.name AS service_name, \
        s.duration, s.price, a.date, a.time, a.status \
     FROM appointments a \
     JOIN masters m ON a.master_id = m.id \
     JOIN services s ON a.service_id = s.id";

/// Stable advisory-lock key for a (master, date) pair so that the overlap
/// check and the insert of two concurrent submissions serialize.
fn occupancy_lock_key(master_id: i32, date: NaiveDate) -> i64 {
    ((master_id as i64) << 32) | (date.num_days_from_ce() as u32 as i64)
}

impl Appointment {
    /// Occupied intervals of a master on a date: the one query the
    /// availability engine needs.
    pub async fn busy_intervals(
        pool: &PgPool,
        master_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<BusyInterval>, BookingError> {
        let rows = sqlx::query_as::<_, (NaiveTime, i32)>(
            "SELECT a.time, s.duration \
             FROM appointments a \
             JOIN services s ON a.service_id = s.id \
             WHERE a.master_id = $1 AND a.date = $2 AND a.status = 'active'",
        )
        .bind(master_id)
        .bind(date)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(time, duration)| BusyInterval::from_time(time, duration))
            .collect())
    }

    /// Inserts the appointment atomically with respect to the non-overlap
    /// invariant.
    ///
    /// The overlap check re-runs inside the same transaction as the insert,
    /// serialized per (master, date) by an advisory transaction lock, which
    /// closes the gap between "slot shown as free" and "slot committed".
    pub async fn insert_checked(pool: &PgPool, req: &BookingRequest) -> Result<i64, BookingError> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(occupancy_lock_key(req.master_id, req.date))
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, (NaiveTime, i32)>(
            "SELECT a.time, s.duration \
             FROM appointments a \
             JOIN services s ON a.service_id = s.id \
             WHERE a.master_id = $1 AND a.date = $2 AND a.status = 'active'",
        )
        .bind(req.master_id)
        .bind(req.date)
        .fetch_all(&mut *tx)
        .await?;

        let busy: Vec<BusyInterval> = rows
            .into_iter()
            .map(|(time, duration)| BusyInterval::from_time(time, duration))
            .collect();
        let start = req.time.hour() * 60 + req.time.minute();
        if conflicts(start, req.duration_minutes.max(0) as u32, &busy) {
            return Err(BookingError::Conflict);
        }

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO appointments \
                (client_id, client_name, phone, master_id, service_id, date, time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(req.client_id)
        .bind(&req.client_name)
        .bind(&req.phone)
        .bind(req.master_id)
        .bind(req.service_id)
        .bind(req.date)
        .bind(req.time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Transitions an Active appointment to a terminal status.
    ///
    /// With `expected_owner` set, a mismatch yields `Forbidden` (admins pass
    /// `None`). A missing or already-terminal appointment yields `NotFound`,
    /// so repeated cancellation has no second side effect.
    pub async fn set_status(
        pool: &PgPool,
        id: i64,
        status: AppointmentStatus,
        expected_owner: Option<i64>,
    ) -> Result<AppointmentView, BookingError> {
        let mut tx = pool.begin().await?;

        let current: Option<(i64, String)> = sqlx::query_as(
            "SELECT client_id, status FROM appointments WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let (owner, current_status) = current.ok_or(BookingError::NotFound)?;
        if let Some(expected) = expected_owner {
            if owner != expected {
                return Err(BookingError::Forbidden);
            }
        }
        if AppointmentStatus::parse(&current_status) != Some(AppointmentStatus::Active) {
            return Err(BookingError::NotFound);
        }

        sqlx::query(
            "UPDATE appointments SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let view = sqlx::query_as::<_, AppointmentView>(
            &format!("{} WHERE a.id = $1", VIEW_SELECT),
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(view)
    }

    pub async fn find_view(pool: &PgPool, id: i64) -> Result<Option<AppointmentView>, BookingError> {
        let view = sqlx::query_as::<_, AppointmentView>(
            &format!("{} WHERE a.id = $1", VIEW_SELECT),
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(view)
    }

    /// A client's appointments with the given status, ordered by date then
    /// time.
    pub async fn list_by_client(
        pool: &PgPool,
        client_id: i64,
        status: AppointmentStatus,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        let views = sqlx::query_as::<_, AppointmentView>(&format!(
            "{} WHERE a.client_id = $1 AND a.status = $2 ORDER BY a.date, a.time",
            VIEW_SELECT
        ))
        .bind(client_id)
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
        Ok(views)
    }

    /// All appointments, optionally filtered by status, ordered by date then
    /// time. Admin listings, the CSV export, and the full mirror resync all
    /// read from here.
    pub async fn list_all(
        pool: &PgPool,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        let views = match status {
            Some(status) => {
                sqlx::query_as::<_, AppointmentView>(&format!(
                    "{} WHERE a.status = $1 ORDER BY a.date, a.time",
                    VIEW_SELECT
                ))
                .bind(status.as_str())
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AppointmentView>(&format!(
                    "{} ORDER BY a.date, a.time",
                    VIEW_SELECT
                ))
                .fetch_all(pool)
                .await?
            }
        };
        Ok(views)
    }

    /// Active appointments on `date` whose reminder has not been sent yet.
    pub async fn due_reminders(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        let views = sqlx::query_as::<_, AppointmentView>(&format!(
            "{} WHERE a.date = $1 AND a.status = 'active' AND a.reminder_sent = false \
             ORDER BY a.time",
            VIEW_SELECT
        ))
        .bind(date)
        .fetch_all(pool)
        .await?;
        Ok(views)
    }

    pub async fn mark_reminder_sent(pool: &PgPool, id: i64) -> Result<(), BookingError> {
        sqlx::query("UPDATE appointments SET reminder_sent = true WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            AppointmentStatus::Active,
            AppointmentStatus::Canceled,
            AppointmentStatus::Completed,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("pending"), None);
    }

    #[test]
    fn lock_key_distinguishes_master_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        assert_ne!(occupancy_lock_key(1, date), occupancy_lock_key(2, date));
        assert_ne!(occupancy_lock_key(1, date), occupancy_lock_key(1, next));
    }
}
