//! Domain error taxonomy.

use thiserror::Error;

/// Errors produced by the booking core.
///
/// `Validation` and `Conflict` are recoverable by re-prompting the user;
/// `Store` covers pool timeouts and query failures and maps to a generic
/// "try again later" reply.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// The slot was taken between "shown as free" and commit.
    #[error("time slot is no longer available")]
    Conflict,

    #[error("appointment not found")]
    NotFound,

    /// Cancellation attempted by someone who does not own the appointment.
    #[error("appointment belongs to another client")]
    Forbidden,

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Startup configuration problems. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
