use thiserror::Error;

/// Classification of a failed call to the remote backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl AppError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => AppError::Auth(body),
            404 => AppError::NotFound(body),
            400 | 422 => AppError::BadRequest(body),
            409 => AppError::Conflict(body),
            500..=599 => AppError::Internal(format!("HTTP {}: {}", status, body)),
            _ => AppError::ExternalService(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Timeouts, dropped connections and 5xx responses may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Internal(_) | AppError::Timeout(_) | AppError::Network(_)
        )
    }

    /// The response body or message attached to the error.
    pub fn detail(&self) -> &str {
        match self {
            AppError::Auth(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg)
            | AppError::ExternalService(msg)
            | AppError::Timeout(msg)
            | AppError::Network(msg)
            | AppError::Decode(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}
