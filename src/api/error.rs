//! API error taxonomy and response mapping.
//!
//! Every failure a handler can report maps to a stable message and
//! status code; the JSON body is always `{"success": false,
//! "message": ...}`. Store and transport faults are logged with full
//! detail server-side and surfaced as a generic 500.

use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Please provide an email and password")]
    MissingCredentials,
    #[error("Please provide email and verification token")]
    MissingVerification,
    #[error("User with this email or telephone already exists")]
    DuplicateAccount,
    #[error("Please wait {retry_after_secs} seconds before requesting a new verification code")]
    RateLimited { retry_after_secs: i64 },
    #[error("Invalid verification token. {attempts_left} attempts remaining")]
    InvalidToken { attempts_left: i64 },
    #[error("Invalid or expired verification token")]
    InvalidOrExpiredToken,
    #[error("Too many failed attempts. Please register again")]
    TooManyAttempts,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid credentials")]
    WrongPassword,
    #[error("Not authorized to access this route")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid appointment date format. Please use DD-MM-YYYY format")]
    InvalidDateFormat,
    #[error("Invalid appointment time format. Please use HH:MM format")]
    InvalidTimeFormat,
    #[error("Cannot create a reservation for a past appointment time")]
    PastAppointment,
    #[error("Appointment time must be between {open} and {close}")]
    OutsideOperatingHours { open: String, close: String },
    #[error("The user with ID {user_id} has already made 3 reservations")]
    QuotaExceeded { user_id: Uuid },
    #[error("Reservations can only be {action} at least 3 hours before the appointment time")]
    CancellationWindowViolated { action: &'static str },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Log the underlying fault and return a generic failure carrying
    /// only the caller-safe message.
    pub fn internal(err: impl std::fmt::Display, message: &str) -> Self {
        error!("{message}: {err}");
        Self::Internal(message.to_string())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::MissingCredentials
            | Self::MissingVerification
            | Self::DuplicateAccount
            | Self::InvalidToken { .. }
            | Self::InvalidOrExpiredToken
            | Self::TooManyAttempts
            | Self::InvalidCredentials
            | Self::InvalidDateFormat
            | Self::InvalidTimeFormat
            | Self::PastAppointment
            | Self::OutsideOperatingHours { .. }
            | Self::QuotaExceeded { .. }
            | Self::CancellationWindowViolated { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::WrongPassword | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        if let Self::RateLimited { retry_after_secs } = self {
            return (status, [(RETRY_AFTER, retry_after_secs.to_string())], body).into_response();
        }
        (status, body).into_response()
    }
}
