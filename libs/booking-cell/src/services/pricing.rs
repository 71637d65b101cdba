use serde::Serialize;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::{BookingDraft, ConsultationType};

const PLATFORM_FEE: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingRule {
    pub consultation_type: ConsultationType,
    pub base_price: f64,
}

/// Price breakdown shown before confirming and used for every outgoing amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub consultation_type: ConsultationType,
    pub price: f64,
    pub platform_fee: f64,
    pub total_price: f64,
    pub currency: String,
}

/// Fixed price per consultation type plus a flat platform fee.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    rules: Vec<PricingRule>,
    platform_fee: f64,
    currency: String,
}

impl PricingTable {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                PricingRule {
                    consultation_type: ConsultationType::InPerson,
                    base_price: 300.0,
                },
                PricingRule {
                    consultation_type: ConsultationType::Video,
                    base_price: 200.0,
                },
                PricingRule {
                    consultation_type: ConsultationType::Home,
                    base_price: 450.0,
                },
            ],
            platform_fee: PLATFORM_FEE,
            currency: "MAD".to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::standard().with_currency(&config.currency)
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn rules(&self) -> &[PricingRule] {
        &self.rules
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn platform_fee(&self) -> f64 {
        self.platform_fee
    }

    pub fn base_price(&self, consultation_type: ConsultationType) -> Option<f64> {
        self.rules
            .iter()
            .find(|rule| rule.consultation_type == consultation_type)
            .map(|rule| rule.base_price)
    }

    pub fn quote(&self, consultation_type: ConsultationType) -> Option<PriceQuote> {
        let price = self.base_price(consultation_type)?;
        let total_price = price + self.platform_fee;

        debug!(
            "Quoted {} consultation: {:.2} + {:.2} fee = {:.2} {}",
            consultation_type.as_str(),
            price,
            self.platform_fee,
            total_price,
            self.currency
        );

        Some(PriceQuote {
            consultation_type,
            price,
            platform_fee: self.platform_fee,
            total_price,
            currency: self.currency.clone(),
        })
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl BookingDraft {
    pub fn computed_price(&self, table: &PricingTable) -> Option<f64> {
        table.base_price(self.consultation_type?)
    }

    pub fn total_price(&self, table: &PricingTable) -> Option<f64> {
        table.quote(self.consultation_type?).map(|q| q.total_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use doctor_cell::DoctorSnapshot;

    fn draft() -> BookingDraft {
        BookingDraft::new(DoctorSnapshot {
            id: 7,
            last_name: "Alaoui".to_string(),
            first_name: "Youssef".to_string(),
            specialty: "Cardiologie".to_string(),
            city: Some("Rabat".to_string()),
            hospital: None,
            phone: None,
            rating: Some(4.6),
            consultation_count: None,
        })
    }

    #[test]
    fn test_video_total_is_base_plus_fee() {
        let table = PricingTable::standard();
        let mut draft = draft();
        draft.consultation_type = Some(ConsultationType::Video);

        assert_eq!(draft.computed_price(&table), Some(200.0));
        assert_eq!(draft.total_price(&table), Some(220.0));

        // Unrelated fields never move the price.
        draft.reason = "long reason".repeat(10);
        draft.date = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert_eq!(draft.total_price(&table), Some(220.0));
    }

    #[test]
    fn test_total_follows_type_changes() {
        let table = PricingTable::standard();
        let mut draft = draft();
        assert_eq!(draft.total_price(&table), None);

        draft.consultation_type = Some(ConsultationType::Home);
        assert_eq!(draft.total_price(&table), Some(470.0));

        draft.consultation_type = Some(ConsultationType::InPerson);
        assert_eq!(draft.total_price(&table), Some(320.0));
    }

    #[test]
    fn test_quote_uses_configured_currency() {
        let config = AppConfig {
            currency: "EUR".to_string(),
            ..AppConfig::default()
        };
        let quote = PricingTable::from_config(&config)
            .quote(ConsultationType::Video)
            .unwrap();

        assert_eq!(quote.currency, "EUR");
        assert_eq!(quote.platform_fee, 20.0);
        assert_eq!(quote.total_price, 220.0);
    }
}
