use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use shared_models::AppError;

use crate::error::PaymentError;
use crate::models::{
    CardConfirmation, PaymentAttempt, PaymentConfirmation, PaymentDetails, PaymentMethod,
    PaymentResponse, PaymentStatus,
};
use crate::services::gateway::PaymentGateway;

/// One way of paying. The coordinator picks a handler by [`PaymentMethod`].
#[async_trait]
pub trait PaymentMethodHandler: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn pay(&self, attempt: &PaymentAttempt) -> Result<PaymentConfirmation, PaymentError>;
}

/// Client-side card confirmation against the card network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardNetwork: Send + Sync {
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        card_token: &str,
    ) -> Result<CardConfirmation, PaymentError>;
}

fn settle(
    attempt: &PaymentAttempt,
    response: PaymentResponse,
    fallback_id: Option<String>,
    default_reason: &str,
) -> Result<PaymentConfirmation, PaymentError> {
    match response.status {
        PaymentStatus::Succeeded => {
            let payment_id = response
                .payment_id
                .or(fallback_id)
                .ok_or_else(|| AppError::Decode("Payment succeeded without an id".to_string()))?;
            Ok(PaymentConfirmation {
                payment_id,
                consultation_id: attempt.consultation_id,
                method: attempt.method(),
                amount: response.amount.unwrap_or(attempt.amount),
                currency: response.currency.unwrap_or_else(|| attempt.currency.clone()),
                transaction_id: response.transaction_id,
            })
        }
        PaymentStatus::Pending | PaymentStatus::Processing => Err(PaymentError::Declined(
            response
                .error_message
                .unwrap_or_else(|| "The payment is still pending. Please try again.".to_string()),
        )),
        _ => Err(PaymentError::Declined(
            response.error_message.unwrap_or_else(|| default_reason.to_string()),
        )),
    }
}

fn wrong_details(method: PaymentMethod) -> PaymentError {
    PaymentError::InvalidAttempt(format!("Missing details for {} payment", method))
}

/// Intent, card network confirmation, then server confirmation.
pub struct CardPaymentMethod {
    gateway: Arc<dyn PaymentGateway>,
    card_network: Arc<dyn CardNetwork>,
}

impl CardPaymentMethod {
    pub fn new(gateway: Arc<dyn PaymentGateway>, card_network: Arc<dyn CardNetwork>) -> Self {
        Self { gateway, card_network }
    }
}

#[async_trait]
impl PaymentMethodHandler for CardPaymentMethod {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }

    async fn pay(&self, attempt: &PaymentAttempt) -> Result<PaymentConfirmation, PaymentError> {
        let PaymentDetails::Card { card_token } = &attempt.details else {
            return Err(wrong_details(PaymentMethod::Card));
        };

        let intent = self.gateway.create_payment_intent(&attempt.to_request()).await?;
        if intent.status.is_failure() {
            return Err(PaymentError::Declined(
                intent
                    .error_message
                    .unwrap_or_else(|| "The card payment could not be started".to_string()),
            ));
        }

        let client_secret = intent
            .client_secret
            .as_deref()
            .ok_or_else(|| AppError::Decode("Payment intent has no client secret".to_string()))?;

        let card = self
            .card_network
            .confirm_card_payment(client_secret, card_token)
            .await?;
        if !card.status.is_success() {
            return Err(PaymentError::Declined(
                card.error_message
                    .unwrap_or_else(|| "The card was declined".to_string()),
            ));
        }

        debug!("Card network accepted intent {}", card.payment_intent_id);
        let confirmed = self.gateway.confirm_payment(&card.payment_intent_id).await?;
        let confirmation = settle(
            attempt,
            confirmed,
            Some(card.payment_intent_id),
            "The card payment could not be confirmed",
        )?;

        info!("Card payment {} succeeded", confirmation.payment_id);
        Ok(confirmation)
    }
}

pub struct MobileMoneyPaymentMethod {
    gateway: Arc<dyn PaymentGateway>,
}

impl MobileMoneyPaymentMethod {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PaymentMethodHandler for MobileMoneyPaymentMethod {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::MobileMoney
    }

    async fn pay(&self, attempt: &PaymentAttempt) -> Result<PaymentConfirmation, PaymentError> {
        let PaymentDetails::MobileMoney { provider, .. } = &attempt.details else {
            return Err(wrong_details(PaymentMethod::MobileMoney));
        };

        debug!("Charging mobile money via {:?}", provider);
        let response = self.gateway.pay_mobile_money(&attempt.to_request()).await?;
        settle(attempt, response, None, "The mobile money payment was refused")
    }
}

pub struct WalletPaymentMethod {
    gateway: Arc<dyn PaymentGateway>,
}

impl WalletPaymentMethod {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PaymentMethodHandler for WalletPaymentMethod {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Wallet
    }

    async fn pay(&self, attempt: &PaymentAttempt) -> Result<PaymentConfirmation, PaymentError> {
        let PaymentDetails::Wallet { order_id } = &attempt.details else {
            return Err(wrong_details(PaymentMethod::Wallet));
        };

        let response = self.gateway.pay_wallet(&attempt.to_request()).await?;
        settle(attempt, response, Some(order_id.clone()), "The wallet payment was refused")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MobileMoneyProvider;
    use crate::services::gateway::MockPaymentGateway;
    use assert_matches::assert_matches;

    fn card_attempt() -> PaymentAttempt {
        PaymentAttempt {
            consultation_id: 31,
            amount: 220.0,
            currency: "MAD".to_string(),
            customer_email: "salma@example.com".to_string(),
            customer_name: "Salma Idrissi".to_string(),
            details: PaymentDetails::Card {
                card_token: "tok_visa".to_string(),
            },
        }
    }

    fn response(status: PaymentStatus) -> PaymentResponse {
        PaymentResponse {
            payment_id: Some("pi_123".to_string()),
            status,
            payment_method: Some("credit_card".to_string()),
            amount: Some(220.0),
            currency: Some("MAD".to_string()),
            transaction_id: None,
            client_secret: Some("pi_123_secret".to_string()),
            error_message: None,
        }
    }

    fn card_ok() -> CardConfirmation {
        CardConfirmation {
            payment_intent_id: "pi_123".to_string(),
            status: PaymentStatus::Succeeded,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_card_payment_runs_all_three_steps() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_intent()
            .times(1)
            .returning(|_| Ok(response(PaymentStatus::RequiresPaymentMethod)));
        gateway
            .expect_confirm_payment()
            .times(1)
            .returning(|_| Ok(response(PaymentStatus::Succeeded)));

        let mut network = MockCardNetwork::new();
        network
            .expect_confirm_card_payment()
            .times(1)
            .returning(|_, _| Ok(card_ok()));

        let handler = CardPaymentMethod::new(Arc::new(gateway), Arc::new(network));
        let confirmation = handler.pay(&card_attempt()).await.unwrap();

        assert_eq!(confirmation.payment_id, "pi_123");
        assert_eq!(confirmation.consultation_id, 31);
        assert_eq!(confirmation.method, PaymentMethod::Card);
    }

    #[tokio::test]
    async fn test_card_decline_skips_server_confirmation() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_intent()
            .returning(|_| Ok(response(PaymentStatus::RequiresPaymentMethod)));
        gateway.expect_confirm_payment().never();

        let mut network = MockCardNetwork::new();
        network.expect_confirm_card_payment().returning(|_, _| {
            Ok(CardConfirmation {
                payment_intent_id: "pi_123".to_string(),
                status: PaymentStatus::Failed,
                error_message: Some("Your card has insufficient funds.".to_string()),
            })
        });

        let handler = CardPaymentMethod::new(Arc::new(gateway), Arc::new(network));
        let result = handler.pay(&card_attempt()).await;

        assert_matches!(result, Err(PaymentError::Declined(msg)) if msg == "Your card has insufficient funds.");
    }

    #[tokio::test]
    async fn test_server_confirmation_failure_is_a_decline() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_intent()
            .returning(|_| Ok(response(PaymentStatus::RequiresPaymentMethod)));
        gateway.expect_confirm_payment().returning(|_| {
            let mut failed = response(PaymentStatus::Failed);
            failed.error_message = Some("Payment could not be captured".to_string());
            Ok(failed)
        });

        let mut network = MockCardNetwork::new();
        network.expect_confirm_card_payment().returning(|_, _| Ok(card_ok()));

        let handler = CardPaymentMethod::new(Arc::new(gateway), Arc::new(network));
        let result = handler.pay(&card_attempt()).await;

        assert_matches!(result, Err(PaymentError::Declined(msg)) if msg == "Payment could not be captured");
    }

    #[tokio::test]
    async fn test_intent_without_secret_is_a_gateway_error() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_intent().returning(|_| {
            let mut intent = response(PaymentStatus::RequiresPaymentMethod);
            intent.client_secret = None;
            Ok(intent)
        });

        let mut network = MockCardNetwork::new();
        network.expect_confirm_card_payment().never();

        let handler = CardPaymentMethod::new(Arc::new(gateway), Arc::new(network));
        assert_matches!(
            handler.pay(&card_attempt()).await,
            Err(PaymentError::Gateway(AppError::Decode(_)))
        );
    }

    #[tokio::test]
    async fn test_pending_mobile_money_is_not_success() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_pay_mobile_money()
            .returning(|_| Ok(response(PaymentStatus::Pending)));

        let handler = MobileMoneyPaymentMethod::new(Arc::new(gateway));
        let mut attempt = card_attempt();
        attempt.details = PaymentDetails::MobileMoney {
            phone_number: "+212600000000".to_string(),
            provider: MobileMoneyProvider::BaridMob,
        };

        assert_matches!(handler.pay(&attempt).await, Err(PaymentError::Declined(_)));
    }

    #[tokio::test]
    async fn test_handler_rejects_details_for_other_method() {
        let gateway = MockPaymentGateway::new();
        let handler = WalletPaymentMethod::new(Arc::new(gateway));

        assert_matches!(
            handler.pay(&card_attempt()).await,
            Err(PaymentError::InvalidAttempt(_))
        );
    }
}
