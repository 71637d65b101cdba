use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use shared_api::ApiClient;
use shared_config::AppConfig;
use shared_models::AppError;

use crate::models::{PaymentRequest, PaymentResponse};

/// Server-side payment operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError>;

    async fn confirm_payment(&self, payment_intent_id: &str) -> Result<PaymentResponse, AppError>;

    async fn pay_mobile_money(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError>;

    async fn pay_wallet(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError>;
}

pub struct HttpPaymentGateway {
    api: Arc<ApiClient>,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ApiClient::for_payments(config)),
        }
    }

    pub fn with_client(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<PaymentResponse, AppError> {
        match self.api.request::<PaymentResponse>(Method::POST, path, body).await {
            Ok(response) => Ok(response),
            // Declines arrive as 400 with a regular payment body.
            Err(AppError::BadRequest(text)) => match serde_json::from_str::<PaymentResponse>(&text) {
                Ok(response) => {
                    debug!("Payment endpoint {} reported {:?}", path, response.status);
                    Ok(response)
                }
                Err(_) => {
                    warn!("Payment endpoint {} rejected the request", path);
                    Err(AppError::BadRequest(text))
                }
            },
            Err(e) => Err(e),
        }
    }

    fn encode(request: &PaymentRequest) -> Result<Value, AppError> {
        serde_json::to_value(request).map_err(AppError::from)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_intent(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError> {
        debug!("Creating payment intent for consultation {}", request.consultation_id);
        self.post("/api/payments/create-payment-intent", Some(Self::encode(request)?))
            .await
    }

    async fn confirm_payment(&self, payment_intent_id: &str) -> Result<PaymentResponse, AppError> {
        let path = format!(
            "/api/payments/confirm-payment?paymentIntentId={}",
            urlencoding::encode(payment_intent_id)
        );
        self.post(&path, None).await
    }

    async fn pay_mobile_money(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError> {
        debug!("Mobile money payment for consultation {}", request.consultation_id);
        self.post("/api/payments/mobile-money", Some(Self::encode(request)?))
            .await
    }

    async fn pay_wallet(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError> {
        debug!("Wallet payment for consultation {}", request.consultation_id);
        self.post("/api/payments/paypal", Some(Self::encode(request)?)).await
    }
}
