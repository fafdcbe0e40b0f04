//! Environment-driven configuration.
//!
//! Required variables (`TELOXIDE_TOKEN`, `DATABASE_URL`, `ADMIN_CHAT_IDS`)
//! abort startup when missing. Everything else has the salon's defaults.

use std::env;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::error::ConfigError;

const DEFAULT_WORK_START: u32 = 9;
const DEFAULT_WORK_END: u32 = 19;
const DEFAULT_SLOT_STEP: u32 = 60;
const DEFAULT_MIN_BOOKING: u32 = 60;
const DEFAULT_TZ_OFFSET_HOURS: i32 = 5;

/// Google Sheets mirror target. Absent when the mirror is disabled.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub sheet_id: String,
    pub sheet_name: String,
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub admin_chat_ids: Vec<i64>,
    /// Opening hour, 0-23.
    pub work_start: u32,
    /// Closing hour, 0-23, strictly greater than `work_start`.
    pub work_end: u32,
    /// Slot grid step in minutes.
    pub slot_step_minutes: u32,
    /// Minimum lead time for same-day bookings, minutes.
    pub min_booking_minutes: u32,
    /// The single business time zone.
    pub tz_offset: FixedOffset,
    pub sheet: Option<SheetConfig>,
    pub salon_address: String,
    pub salon_phone: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // The token itself is consumed by Bot::from_env; here we only verify
        // its presence so a missing token fails before the dispatcher starts.
        env::var("TELOXIDE_TOKEN").map_err(|_| ConfigError::Missing("TELOXIDE_TOKEN"))?;
        env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let admins_raw =
            env::var("ADMIN_CHAT_IDS").map_err(|_| ConfigError::Missing("ADMIN_CHAT_IDS"))?;
        let admin_chat_ids: Vec<i64> =
            serde_json::from_str(&admins_raw).map_err(|e| ConfigError::Invalid {
                var: "ADMIN_CHAT_IDS",
                reason: format!("expected a JSON array of chat ids: {}", e),
            })?;

        let work_start = parse_var("WORK_START", DEFAULT_WORK_START)?;
        let work_end = parse_var("WORK_END", DEFAULT_WORK_END)?;
        let slot_step_minutes = parse_var("TIME_SLOT_STEP", DEFAULT_SLOT_STEP)?;
        let min_booking_minutes = parse_var("MIN_BOOKING_TIME", DEFAULT_MIN_BOOKING)?;

        if work_start > 23 {
            return Err(ConfigError::Invalid {
                var: "WORK_START",
                reason: "must be between 0 and 23".into(),
            });
        }
        if work_end > 23 {
            return Err(ConfigError::Invalid {
                var: "WORK_END",
                reason: "must be between 0 and 23".into(),
            });
        }
        if work_start >= work_end {
            return Err(ConfigError::Invalid {
                var: "WORK_START",
                reason: "must be earlier than WORK_END".into(),
            });
        }
        if slot_step_minutes == 0 || slot_step_minutes > 240 {
            return Err(ConfigError::Invalid {
                var: "TIME_SLOT_STEP",
                reason: "must be between 1 and 240 minutes".into(),
            });
        }

        let tz_hours: i32 = parse_var("TZ_OFFSET_HOURS", DEFAULT_TZ_OFFSET_HOURS)?;
        let tz_offset =
            FixedOffset::east_opt(tz_hours * 3600).ok_or_else(|| ConfigError::Invalid {
                var: "TZ_OFFSET_HOURS",
                reason: "offset out of range".into(),
            })?;

        // The mirror is optional: with no sheet configured the bot runs
        // without it, never failing startup.
        let sheet = match (
            env::var("GOOGLE_SHEET_ID").ok(),
            env::var("GOOGLE_SHEETS_TOKEN").ok(),
        ) {
            (Some(sheet_id), Some(access_token)) => Some(SheetConfig {
                sheet_id,
                sheet_name: env::var("GOOGLE_SHEET_NAME").unwrap_or_else(|_| "K1".to_string()),
                access_token,
            }),
            _ => None,
        };

        Ok(Config {
            admin_chat_ids,
            work_start,
            work_end,
            slot_step_minutes,
            min_booking_minutes,
            tz_offset,
            sheet,
            salon_address: env::var("SALON_ADDRESS")
                .unwrap_or_else(|_| "ул. Примерная, 123".to_string()),
            salon_phone: env::var("SALON_PHONE")
                .unwrap_or_else(|_| "+7 (3532) 123-456".to_string()),
        })
    }

    /// Current moment in the business time zone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz_offset)
    }

    /// Today's calendar date in the business time zone.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn is_admin(&self, chat_id: i64) -> bool {
        self.admin_chat_ids.contains(&chat_id)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("{}", e),
        }),
        Err(_) => Ok(default),
    }
}
