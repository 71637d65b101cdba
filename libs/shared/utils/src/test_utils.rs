use std::sync::{Arc, Once};

use chrono::NaiveDateTime;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shared_config::AppConfig;
use shared_models::{AuthenticatedUser, UserType};

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn` so passing test runs stay quiet.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

pub struct TestConfig {
    pub api_base_url: String,
    pub payments_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            payments_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl TestConfig {
    /// Points both the API and the payments service at one mock server.
    pub fn with_server(uri: &str) -> Self {
        Self {
            api_base_url: uri.to_string(),
            payments_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            payments_base_url: self.payments_base_url.clone(),
            request_timeout_secs: self.request_timeout_secs,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient(42, "patient@example.com")
    }
}

impl TestUser {
    pub fn patient(id: i64, email: &str) -> Self {
        Self {
            id,
            email: email.to_string(),
            first_name: "Salma".to_string(),
            last_name: "Idrissi".to_string(),
            user_type: UserType::Patient,
        }
    }

    pub fn doctor(id: i64, email: &str) -> Self {
        Self {
            user_type: UserType::Doctor,
            first_name: "Youssef".to_string(),
            last_name: "Alaoui".to_string(),
            ..Self::patient(id, email)
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn to_authenticated_user(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: self.id,
            user_type: self.user_type,
            email: Some(self.email.clone()),
            name: self.full_name(),
        }
    }
}

/// JSON bodies shaped like the backend's responses.
pub struct MockApiResponses;

impl MockApiResponses {
    pub fn doctor_response(id: i64, last_name: &str, first_name: &str, specialty: &str, city: &str) -> Value {
        json!({
            "id": id,
            "nom": last_name,
            "prenom": first_name,
            "specialite": specialty,
            "city": city,
            "hopital": "CHU Ibn Sina",
            "telephone": "+212600000000",
            "rating": 4.6,
            "nombreConsultations": 120
        })
    }

    pub fn patient_response(user: &TestUser) -> Value {
        json!({
            "id": user.id,
            "nom": user.last_name,
            "prenom": user.first_name,
            "email": user.email
        })
    }

    pub fn consultation_response(id: i64, doctor_id: i64, patient_id: i64, date_time: NaiveDateTime) -> Value {
        json!({
            "id": id,
            "dateConsultation": date_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "docteur": { "id": doctor_id },
            "patient": { "id": patient_id },
            "etat": "PENDING"
        })
    }

    pub fn payment_response(payment_id: &str, status: &str, method: &str, amount: f64) -> Value {
        json!({
            "paymentId": payment_id,
            "status": status,
            "paymentMethod": method,
            "amount": amount
        })
    }

    pub fn payment_intent_response(payment_id: &str, client_secret: &str, amount: f64) -> Value {
        json!({
            "paymentId": payment_id,
            "status": "requires_payment_method",
            "paymentMethod": "card",
            "amount": amount,
            "clientSecret": client_secret
        })
    }

    pub fn payment_failed_response(message: &str) -> Value {
        json!({
            "status": "failed",
            "errorMessage": message
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_points_to_server() {
        let config = TestConfig::with_server("http://127.0.0.1:9999").to_app_config();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9999");
        assert_eq!(config.payments_base_url, "http://127.0.0.1:9999");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_user_conversion() {
        let user = TestUser::doctor(9, "dr@example.com").to_authenticated_user();
        assert_eq!(user.user_type, UserType::Doctor);
        assert_eq!(user.name, "Youssef Alaoui");
    }
}
