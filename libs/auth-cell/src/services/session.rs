use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shared_models::{AuthenticatedUser, Credentials};

use crate::error::AuthError;
use crate::services::provider::AuthProvider;

/// The single owner of "who is logged in" for the running application.
///
/// Created once at startup, populated by [`initialize`](Self::initialize) or
/// [`login`](Self::login) and emptied by [`logout`](Self::logout). Nothing else
/// keeps a copy of the identity.
pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    current: RwLock<Option<AuthenticatedUser>>,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            current: RwLock::new(None),
        }
    }

    /// Starts with a known user, without asking the backend.
    pub fn with_user(provider: Arc<dyn AuthProvider>, user: AuthenticatedUser) -> Self {
        Self {
            provider,
            current: RwLock::new(Some(user)),
        }
    }

    /// Picks up a session the backend already recognizes.
    pub async fn initialize(&self) -> Result<Option<AuthenticatedUser>, AuthError> {
        let session = self.provider.current_session().await?;
        match &session {
            Some(user) => info!("Resumed session for user {}", user.user_id),
            None => debug!("Starting without an authenticated session"),
        }
        *self.current.write().await = session.clone();
        Ok(session)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthenticatedUser, AuthError> {
        let user = self.provider.authenticate(credentials).await?;
        *self.current.write().await = Some(user.clone());
        Ok(user)
    }

    /// Forgets the local identity even when the backend call fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let previous = self.current.write().await.take();
        if let Some(user) = previous {
            info!("Logging out user {}", user.user_id);
        }

        if let Err(e) = self.provider.logout().await {
            warn!("Local session cleared but backend logout failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    pub async fn current(&self) -> Option<AuthenticatedUser> {
        self.current.read().await.clone()
    }

    pub async fn require_user(&self) -> Result<AuthenticatedUser, AuthError> {
        self.current().await.ok_or(AuthError::NotAuthenticated)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }
}
