//! Application state shared across handlers

use crate::auth::password::PasswordConfig;
use crate::auth::service::AuthService;
use crate::auth::session::SessionCache;
use crate::auth::store::CredentialStore;
use quill_core::AppConfig;
use std::sync::Arc;

/// Shared state: configuration plus the constructed auth service.
///
/// Collaborators are injected here rather than built inside the service,
/// so tests substitute in-memory fakes for Postgres and Redis.
pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        let auth = AuthService::new(store, cache, config.auth.clone());
        Self { config, auth }
    }

    /// Override the Argon2 parameters on the underlying service.
    pub fn with_password_config(mut self, password_config: PasswordConfig) -> Self {
        self.auth = self.auth.clone().with_password_config(password_config);
        self
    }
}
