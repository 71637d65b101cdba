use thiserror::Error;

use shared_models::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(i64),

    #[error("Invalid search: {0}")]
    InvalidQuery(String),

    #[error("Doctor directory unavailable: {0}")]
    Remote(#[from] AppError),
}
