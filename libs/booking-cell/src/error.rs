use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use auth_cell::AuthError;
use doctor_cell::DoctorError;
use shared_models::AppError;

use crate::models::{DraftField, SlotTime};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required fields: {}", field_list(.0))]
    MissingFields(Vec<DraftField>),

    #[error("Date {date} is in the past (today is {today})")]
    InvalidDate { date: NaiveDate, today: NaiveDate },

    #[error("{0} is not a bookable time")]
    InvalidTime(SlotTime),
}

fn field_list(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Please log in to complete the booking")]
    AuthRequired,

    #[error("The {time} slot was just taken, please choose another time")]
    SlotConflict { time: SlotTime },

    #[error("The {time} slot is already booked")]
    SlotUnavailable { time: SlotTime },

    #[error("Slot availability could not be checked, please retry")]
    AvailabilityUnknown,

    #[error("{0}")]
    TransientNetwork(String),

    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    #[error("Saved booking is no longer usable: {0}")]
    SessionCorrupt(String),

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("The booking was closed")]
    WorkflowClosed,

    #[error("Booking session storage failed: {0}")]
    Storage(String),

    #[error("The booking request was rejected")]
    Rejected,

    #[error("Your account has no email or name for the payment receipt")]
    MissingPatientContact,
}

impl BookingError {
    /// Errors the user can retry without changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::TransientNetwork(_) | BookingError::AvailabilityUnknown
        )
    }
}

/// Remote errors are logged in full here and reach the user only as a category.
impl From<AppError> for BookingError {
    fn from(err: AppError) -> Self {
        warn!("Backend call failed: {}", err);
        match err {
            AppError::Auth(_) => BookingError::AuthRequired,
            AppError::Timeout(_) => {
                BookingError::TransientNetwork("The request timed out, please retry".to_string())
            }
            AppError::Network(_) => {
                BookingError::TransientNetwork("Could not reach the server, please retry".to_string())
            }
            AppError::Internal(_) => BookingError::TransientNetwork(
                "The server is temporarily unavailable, please retry".to_string(),
            ),
            AppError::BadRequest(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::ExternalService(_)
            | AppError::Decode(_) => BookingError::Rejected,
        }
    }
}

impl From<AuthError> for BookingError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated | AuthError::InvalidCredentials(_) => BookingError::AuthRequired,
            AuthError::Remote(e) => e.into(),
        }
    }
}

impl From<DoctorError> for BookingError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(id) => {
                BookingError::SessionCorrupt(format!("doctor {} is no longer available", id))
            }
            DoctorError::InvalidQuery(_) => BookingError::Rejected,
            DoctorError::Remote(e) => e.into(),
        }
    }
}
