use thiserror::Error;

use shared_models::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authentication service error: {0}")]
    Remote(AppError),
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Auth(msg) | AppError::NotFound(msg) => AuthError::InvalidCredentials(msg),
            other => AuthError::Remote(other),
        }
    }
}
