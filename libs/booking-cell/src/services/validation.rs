use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::models::{BookingDraft, DraftField};

/// Checks that a draft can be submitted on `today`. Slot availability is
/// checked separately against the slot board.
pub fn validate(draft: &BookingDraft, today: NaiveDate) -> Result<(), ValidationError> {
    let mut missing = Vec::new();

    if draft.doctor_id <= 0 {
        missing.push(DraftField::DoctorId);
    }
    if draft.date.is_none() {
        missing.push(DraftField::Date);
    }
    if draft.time.is_none() {
        missing.push(DraftField::Time);
    }
    if draft.reason.trim().is_empty() {
        missing.push(DraftField::Reason);
    }
    if draft.consultation_type.is_none() {
        missing.push(DraftField::ConsultationType);
    }

    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    match draft.date {
        Some(date) if date < today => Err(ValidationError::InvalidDate { date, today }),
        _ => Ok(()),
    }
}
