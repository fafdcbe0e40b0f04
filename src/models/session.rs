//! Per-client booking session: the multi-step flow that collects a master,
//! a service, contact details, and a slot before handing a validated
//! request to the orchestrator.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::appointment::BookingRequest;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;

/// Strict forward order of the flow. "Idle" is the absence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStep {
    SelectingMaster,
    SelectingService,
    EnteringName,
    EnteringPhone,
    SelectingDate,
    SelectingTime,
    Confirming,
}

impl BookingStep {
    /// The predecessor step, or `None` at the start of the flow.
    pub fn back(self) -> Option<BookingStep> {
        use BookingStep::*;
        match self {
            SelectingMaster => None,
            SelectingService => Some(SelectingMaster),
            EnteringName => Some(SelectingService),
            EnteringPhone => Some(EnteringName),
            SelectingDate => Some(EnteringPhone),
            SelectingTime => Some(SelectingDate),
            Confirming => Some(SelectingTime),
        }
    }
}

/// Ephemeral session state. One per client; an invalid input never advances
/// the step and never touches already captured fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSession {
    pub step: BookingStep,
    pub master_id: Option<i32>,
    pub master_name: Option<String>,
    pub service_id: Option<i32>,
    pub service_name: Option<String>,
    pub duration_minutes: Option<i32>,
    pub price: Option<f64>,
    pub client_name: Option<String>,
    pub phone: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl BookingSession {
    pub fn new() -> Self {
        BookingSession {
            step: BookingStep::SelectingMaster,
            master_id: None,
            master_name: None,
            service_id: None,
            service_name: None,
            duration_minutes: None,
            price: None,
            client_name: None,
            phone: None,
            date: None,
            time: None,
        }
    }

    /// Moves one step back. Returns `false` when already at the first step,
    /// which the caller treats as "leave the flow".
    pub fn step_back(&mut self) -> bool {
        match self.step.back() {
            Some(prev) => {
                self.step = prev;
                true
            }
            None => false,
        }
    }

    /// Converts a fully populated session into a commit request. `None`
    /// means some step was skipped, which is a bug of the flow, not user
    /// error.
    pub fn into_request(self, client_id: i64) -> Option<BookingRequest> {
        Some(BookingRequest {
            client_id,
            client_name: self.client_name?,
            phone: self.phone?,
            master_id: self.master_id?,
            service_id: self.service_id?,
            date: self.date?,
            time: self.time?,
            duration_minutes: self.duration_minutes?,
        })
    }
}

impl Default for BookingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Trims and validates a client name: 2-50 characters.
pub fn validate_name(input: &str) -> Option<String> {
    let name = input.trim();
    let len = name.chars().count();
    if (NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        Some(name.to_string())
    } else {
        None
    }
}

/// Normalizes a Russian phone number to the canonical `+7XXXXXXXXXX` form.
///
/// All non-digits are stripped; the result is valid iff exactly 11 digits
/// remain and the first is '7' or '8'.
pub fn normalize_phone(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && (digits.starts_with('7') || digits.starts_with('8')) {
        Some(format!("+7{}", &digits[1..]))
    } else {
        None
    }
}

/// Resolves a "ДД.ММ" pair to the nearest calendar date that is today or
/// later: first the current year, then the next (covers year rollover and
/// Feb 29 in a non-leap year).
pub fn resolve_booking_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (day_raw, month_raw) = input.trim().split_once('.')?;
    let day: u32 = day_raw.trim().parse().ok()?;
    let month: u32 = month_raw.trim().parse().ok()?;

    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day).filter(|d| *d >= today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn name_length_bounds() {
        assert_eq!(validate_name("  Иван  "), Some("Иван".to_string()));
        assert_eq!(validate_name("Ян"), Some("Ян".to_string()));
        assert!(validate_name("и").is_none());
        assert!(validate_name(&"а".repeat(51)).is_none());
        assert!(validate_name("   ").is_none());
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("89161234567"), Some("+79161234567".to_string()));
        assert_eq!(
            normalize_phone("+7 (916) 123-45-67"),
            Some("+79161234567".to_string())
        );
        assert!(normalize_phone("12345").is_none());
        assert!(normalize_phone("99161234567").is_none());
        assert!(normalize_phone("791612345678").is_none());
    }

    #[test]
    fn date_in_current_year() {
        let today = d(2026, 3, 10);
        assert_eq!(resolve_booking_date("15.03", today), Some(d(2026, 3, 15)));
        assert_eq!(resolve_booking_date("10.03", today), Some(d(2026, 3, 10)));
    }

    #[test]
    fn past_date_rolls_to_next_year() {
        let today = d(2026, 3, 10);
        assert_eq!(resolve_booking_date("01.01", today), Some(d(2027, 1, 1)));
    }

    #[test]
    fn feb_29_resolves_to_next_leap_year_or_fails() {
        // 2027 is not a leap year either, so 29.02 has no valid resolution.
        assert!(resolve_booking_date("29.02", d(2026, 3, 1)).is_none());
        // From 2027, next year 2028 is a leap year.
        assert_eq!(
            resolve_booking_date("29.02", d(2027, 3, 1)),
            Some(d(2028, 2, 29))
        );
    }

    #[test]
    fn garbage_dates_rejected() {
        let today = d(2026, 3, 10);
        assert!(resolve_booking_date("32.01", today).is_none());
        assert!(resolve_booking_date("чепуха", today).is_none());
        assert!(resolve_booking_date("15", today).is_none());
        assert!(resolve_booking_date("15.13", today).is_none());
    }

    #[test]
    fn back_walks_to_the_start() {
        let mut session = BookingSession::new();
        session.step = BookingStep::Confirming;
        let mut steps = 0;
        while session.step_back() {
            steps += 1;
        }
        assert_eq!(steps, 6);
        assert_eq!(session.step, BookingStep::SelectingMaster);
    }

    #[test]
    fn back_keeps_captured_fields() {
        let mut session = BookingSession::new();
        session.step = BookingStep::EnteringPhone;
        session.client_name = Some("Иван".to_string());
        assert!(session.step_back());
        assert_eq!(session.step, BookingStep::EnteringName);
        assert_eq!(session.client_name.as_deref(), Some("Иван"));
    }

    #[test]
    fn incomplete_session_produces_no_request() {
        let session = BookingSession::new();
        assert!(session.into_request(1).is_none());
    }

    #[test]
    fn complete_session_produces_request() {
        let mut session = BookingSession::new();
        session.master_id = Some(1);
        session.master_name = Some("Анна".to_string());
        session.service_id = Some(2);
        session.service_name = Some("Маникюр".to_string());
        session.duration_minutes = Some(60);
        session.price = Some(1200.0);
        session.client_name = Some("Иван".to_string());
        session.phone = Some("+79161234567".to_string());
        session.date = Some(d(2026, 9, 1));
        session.time = NaiveTime::from_hms_opt(10, 0, 0);

        let req = session.into_request(42).unwrap();
        assert_eq!(req.client_id, 42);
        assert_eq!(req.master_id, 1);
        assert_eq!(req.duration_minutes, 60);
    }
}
