use std::fmt;

use serde::{Deserialize, Serialize};

use shared_models::ConsultationId;

use crate::error::PaymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "credit_card")]
    Card,
    #[serde(rename = "mobile_money")]
    MobileMoney,
    #[serde(rename = "paypal")]
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "credit_card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Wallet => "paypal",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileMoneyProvider {
    OrangeMoney,
    InwiMoney,
    BaridMob,
}

/// Method-specific fields of a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentDetails {
    Card { card_token: String },
    MobileMoney { phone_number: String, provider: MobileMoneyProvider },
    Wallet { order_id: String },
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Card { .. } => PaymentMethod::Card,
            PaymentDetails::MobileMoney { .. } => PaymentMethod::MobileMoney,
            PaymentDetails::Wallet { .. } => PaymentMethod::Wallet,
        }
    }
}

/// One try at settling a consultation through one method.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    pub consultation_id: ConsultationId,
    pub amount: f64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: String,
    pub details: PaymentDetails,
}

impl PaymentAttempt {
    pub fn method(&self) -> PaymentMethod {
        self.details.method()
    }

    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.consultation_id <= 0 {
            return Err(PaymentError::InvalidAttempt("Consultation ID is required".to_string()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(PaymentError::InvalidAttempt("Amount must be positive".to_string()));
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::InvalidAttempt("Currency is required".to_string()));
        }

        let missing = match &self.details {
            PaymentDetails::Card { card_token } if card_token.trim().is_empty() => Some("card details"),
            PaymentDetails::MobileMoney { phone_number, .. } if phone_number.trim().is_empty() => {
                Some("a phone number")
            }
            PaymentDetails::Wallet { order_id } if order_id.trim().is_empty() => Some("a wallet order"),
            _ => None,
        };

        match missing {
            Some(what) => Err(PaymentError::InvalidAttempt(format!("Payment requires {}", what))),
            None => Ok(()),
        }
    }

    pub fn to_request(&self) -> PaymentRequest {
        let mut request = PaymentRequest {
            consultation_id: self.consultation_id,
            payment_method: self.method(),
            amount: self.amount,
            currency: self.currency.clone(),
            customer_email: self.customer_email.clone(),
            customer_name: self.customer_name.clone(),
            phone_number: None,
            mobile_money_provider: None,
            paypal_order_id: None,
        };

        match &self.details {
            PaymentDetails::Card { .. } => {}
            PaymentDetails::MobileMoney { phone_number, provider } => {
                request.phone_number = Some(phone_number.clone());
                request.mobile_money_provider = Some(*provider);
            }
            PaymentDetails::Wallet { order_id } => {
                request.paypal_order_id = Some(order_id.clone());
            }
        }

        request
    }
}

/// Body sent to the payments API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub consultation_id: ConsultationId,
    pub payment_method: PaymentMethod,
    pub amount: f64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_money_provider: Option<MobileMoneyProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paypal_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Pending,
    Processing,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Failed,
    Cancelled,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled)
    }
}

/// Response returned by every payments endpoint, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    #[serde(default)]
    pub payment_id: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Result of the client-side card network confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct CardConfirmation {
    pub payment_intent_id: String,
    pub status: PaymentStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub consultation_id: ConsultationId,
    pub method: PaymentMethod,
    pub amount: f64,
    pub currency: String,
    pub transaction_id: Option<String>,
}

/// The only shape a payment result takes outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Succeeded(PaymentConfirmation),
    Failed { reason: String },
}

impl PaymentOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, PaymentOutcome::Succeeded(_))
    }
}
