pub mod auth;
pub mod error;

pub use auth::*;
pub use error::AppError;

/// Backend-assigned identifiers are numeric.
pub type DoctorId = i64;
pub type PatientId = i64;
pub type ConsultationId = i64;
