use thiserror::Error;

use shared_models::AppError;

use crate::models::PaymentMethod;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Invalid payment attempt: {0}")]
    InvalidAttempt(String),

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment method unavailable: {0}")]
    MethodUnavailable(PaymentMethod),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] AppError),
}

impl PaymentError {
    /// Text that can be shown to the payer. Gateway payloads are never included.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::InvalidAttempt(msg) | PaymentError::Declined(msg) => msg.clone(),
            PaymentError::MethodUnavailable(method) => {
                format!("Payments by {} are not available", method)
            }
            PaymentError::Gateway(err) if err.is_transient() => {
                "The payment service is temporarily unavailable. Please try again.".to_string()
            }
            PaymentError::Gateway(_) => {
                "The payment could not be processed. Please try another method.".to_string()
            }
        }
    }
}
