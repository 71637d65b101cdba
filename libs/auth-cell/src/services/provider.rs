use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_api::ApiClient;
use shared_config::AppConfig;
use shared_models::{AppError, AuthenticatedUser, Credentials, UserType};

use crate::error::AuthError;

/// Identity operations offered by the backend.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser, AuthError>;

    /// The session the backend currently recognizes, if any.
    async fn current_session(&self) -> Result<Option<AuthenticatedUser>, AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;
}

/// Patient and doctor records share these fields.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: i64,
    #[serde(rename = "nom", default)]
    last_name: String,
    #[serde(rename = "prenom", default)]
    first_name: String,
    #[serde(default)]
    email: Option<String>,
}

impl AccountRecord {
    fn into_user(self, user_type: UserType) -> AuthenticatedUser {
        let name = format!("{} {}", self.first_name, self.last_name).trim().to_string();
        AuthenticatedUser {
            user_id: self.id,
            user_type,
            email: self.email,
            name,
        }
    }
}

pub struct HttpAuthProvider {
    api: Arc<ApiClient>,
}

impl HttpAuthProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser, AuthError> {
        let (path, body, user_type) = match credentials {
            Credentials::Patient { email, password } => {
                debug!("Authenticating patient {}", email);
                (
                    "/api/patients/login",
                    json!({ "email": email, "motDePasse": password }),
                    UserType::Patient,
                )
            }
            Credentials::Doctor { professional_number, password } => {
                debug!("Authenticating doctor {}", professional_number);
                (
                    "/api/docteurs/login",
                    json!({ "numeroProfessionnel": professional_number, "motDePasse": password }),
                    UserType::Doctor,
                )
            }
        };

        let record: AccountRecord = self.api.request(Method::POST, path, Some(body)).await?;
        let user = record.into_user(user_type);

        info!("User {} authenticated as {:?}", user.user_id, user.user_type);
        Ok(user)
    }

    async fn current_session(&self) -> Result<Option<AuthenticatedUser>, AuthError> {
        match self
            .api
            .request_optional::<AccountRecord>(Method::GET, "/api/patients/me", None)
            .await
        {
            Ok(record) => Ok(record.map(|r| r.into_user(UserType::Patient))),
            Err(AppError::Auth(_)) => {
                debug!("No active backend session");
                Ok(None)
            }
            Err(e) => Err(AuthError::Remote(e)),
        }
    }

    async fn logout(&self) -> Result<(), AuthError> {
        // The logout endpoint answers with plain text.
        self.api
            .send(Method::POST, "/api/patients/logout", None)
            .await
            .map_err(|e| {
                warn!("Backend logout failed: {}", e);
                AuthError::Remote(e)
            })?;
        Ok(())
    }
}
