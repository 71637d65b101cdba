use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use shared_config::AppConfig;

use crate::error::PaymentError;
use crate::models::{PaymentAttempt, PaymentMethod, PaymentOutcome};
use crate::services::gateway::{HttpPaymentGateway, PaymentGateway};
use crate::services::methods::{
    CardNetwork, CardPaymentMethod, MobileMoneyPaymentMethod, PaymentMethodHandler,
    WalletPaymentMethod,
};

/// Routes an attempt to the handler for its method and folds every result
/// into a [`PaymentOutcome`].
///
/// The coordinator never creates or touches consultations. Retrying a failed
/// payment is just another call to [`pay`](Self::pay) for the same
/// consultation id.
#[derive(Default)]
pub struct PaymentCoordinator {
    handlers: HashMap<PaymentMethod, Arc<dyn PaymentMethodHandler>>,
}

impl PaymentCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn PaymentMethodHandler>) -> Self {
        self.handlers.insert(handler.method(), handler);
        self
    }

    /// Card, mobile money and wallet, all backed by one gateway.
    pub fn standard(gateway: Arc<dyn PaymentGateway>, card_network: Arc<dyn CardNetwork>) -> Self {
        Self::new()
            .with_handler(Arc::new(CardPaymentMethod::new(gateway.clone(), card_network)))
            .with_handler(Arc::new(MobileMoneyPaymentMethod::new(gateway.clone())))
            .with_handler(Arc::new(WalletPaymentMethod::new(gateway)))
    }

    pub fn from_config(config: &AppConfig, card_network: Arc<dyn CardNetwork>) -> Self {
        Self::standard(Arc::new(HttpPaymentGateway::new(config)), card_network)
    }

    pub fn available_methods(&self) -> Vec<PaymentMethod> {
        let mut methods: Vec<PaymentMethod> = self.handlers.keys().copied().collect();
        methods.sort();
        methods
    }

    pub async fn pay(&self, attempt: &PaymentAttempt) -> PaymentOutcome {
        let method = attempt.method();
        info!(
            "Paying consultation {} by {} ({} {})",
            attempt.consultation_id, method, attempt.amount, attempt.currency
        );

        let result = match attempt.validate() {
            Err(e) => Err(e),
            Ok(()) => match self.handlers.get(&method) {
                Some(handler) => handler.pay(attempt).await,
                None => Err(PaymentError::MethodUnavailable(method)),
            },
        };

        match result {
            Ok(confirmation) => {
                info!(
                    "Consultation {} paid, payment {}",
                    attempt.consultation_id, confirmation.payment_id
                );
                PaymentOutcome::Succeeded(confirmation)
            }
            Err(e) => {
                warn!("Payment for consultation {} failed: {}", attempt.consultation_id, e);
                PaymentOutcome::Failed {
                    reason: e.user_message(),
                }
            }
        }
    }
}
