//! Authentication service: the state machine over one account's session
//!
//! Orchestrates login, registration, logout, verification and refresh
//! against the credential store and the session cache. The session cache
//! holds at most one token per account; issuing a new token overwrites
//! the previous entry, which is what enforces single-active-session
//! semantics. Writes to the cache are advisory (a login must not fail
//! because revocation is degraded), reads during verification are
//! load-bearing and fail closed.

use super::jwt::{self, Claims, JwtError};
use super::password::{self, PasswordConfig, PasswordError};
use super::session::SessionCache;
use super::store::{CredentialStore, NewAccount, StoreError};
use quill_core::{Account, AccountPublic, AuthConfig, ROLE_USER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Closed set of authentication error kinds.
///
/// Callers branch on the kind, never on message text. The client-facing
/// collapse of `InvalidSignature`/`Revoked` happens at the HTTP boundary;
/// here the kinds stay distinct for logging.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("{field} already exists")]
    Conflict { field: &'static str },

    #[error("Account not found")]
    NotFound,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Auth backend unavailable")]
    ServiceUnavailable,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Internal auth error: {0}")]
    Internal(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            JwtError::InvalidSignature => AuthError::InvalidSignature,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => AuthError::ServiceUnavailable,
            // Unique violation on insert: concurrent registrations can
            // race past the find-first checks, and the loser still gets
            // a Conflict, not an internal error.
            StoreError::Duplicate { field } => AuthError::Conflict { field },
            StoreError::Database(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Result of a successful login, registration or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSuccess {
    pub user: AccountPublic,
    pub token: String,
}

/// Session cache key for an account: `session:<account id>`.
fn session_key(account_id: Uuid) -> String {
    format!("session:{account_id}")
}

/// Authentication service with injected collaborators.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn SessionCache>,
    auth_config: AuthConfig,
    password_config: PasswordConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn SessionCache>,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            store,
            cache,
            auth_config,
            password_config: PasswordConfig::default(),
        }
    }

    /// Override the Argon2 parameters (lighter settings for tests).
    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.password_config = config;
        self
    }

    /// Authenticate by username and password, issuing a fresh token.
    ///
    /// Any previously issued token for this account becomes unverifiable
    /// immediately: the cache entry is overwritten. Concurrent logins
    /// race last-write-wins; the loser's token fails verification.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSuccess, AuthError> {
        let account = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !account.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        let password_ok =
            password::verify_password_async(password.to_string(), account.password_hash.clone())
                .await?;
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        // Best-effort bookkeeping; a failed timestamp update never blocks login.
        if let Err(err) = self.store.update_last_login(account.id).await {
            warn!(account_id = %account.id, error = %err, "last-login update failed");
        }

        self.open_session(&account).await
    }

    /// Create an account and log it in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSuccess, AuthError> {
        password::validate_password_strength(password).map_err(AuthError::WeakPassword)?;

        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict { field: "username" });
        }
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::Conflict { field: "email" });
        }

        let password = password.to_string();
        let config = self.password_config.clone();
        let password_hash =
            tokio::task::spawn_blocking(move || password::hash_password_with_config(&password, &config))
                .await
                .map_err(|e| AuthError::Internal(e.to_string()))??;

        let account = self
            .store
            .create(NewAccount {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role: ROLE_USER.to_string(),
            })
            .await?;

        self.open_session(&account).await
    }

    /// Drop the account's session cache entry.
    ///
    /// Always succeeds from the caller's perspective: the client discards
    /// its token regardless, so a failed delete is only logged.
    pub async fn logout(&self, account_id: Uuid) {
        if let Err(err) = self.cache.delete(&session_key(account_id)).await {
            warn!(account_id = %account_id, error = %err, "session delete failed; token will lapse at expiry");
        }
    }

    /// Validate a presented token cryptographically and against the cache.
    ///
    /// A cache read failure means revocation cannot be confirmed, so the
    /// token is rejected (`ServiceUnavailable`) rather than accepted.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = jwt::decode_token(&self.auth_config, token)?;

        let account_id =
            Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSignature)?;

        let current = self
            .cache
            .get(&session_key(account_id))
            .await
            .map_err(|err| {
                warn!(account_id = %account_id, error = %err, "session read failed; failing closed");
                AuthError::ServiceUnavailable
            })?;

        match current {
            Some(stored) if stored == token => Ok(claims),
            _ => Err(AuthError::Revoked),
        }
    }

    /// Exchange a valid token for a fresh one.
    ///
    /// Re-fetches the account so a role or status change since issuance
    /// lands in the new claims. The presented token is implicitly
    /// invalidated by the cache overwrite.
    pub async fn refresh(&self, token: &str) -> Result<AuthSuccess, AuthError> {
        let claims = self.verify(token).await?;

        let account_id =
            Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSignature)?;
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !account.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        self.open_session(&account).await
    }

    /// Fetch the public profile for an authenticated account.
    pub async fn get_account(&self, account_id: Uuid) -> Result<AccountPublic, AuthError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok(AccountPublic::from(&account))
    }

    /// Issue a token and mirror it into the session cache.
    ///
    /// The cache write is advisory: on failure the login still succeeds
    /// with revocation temporarily degraded, which beats refusing logins
    /// during a cache outage.
    async fn open_session(&self, account: &Account) -> Result<AuthSuccess, AuthError> {
        let token = jwt::issue_token(&self.auth_config, account)?;

        if let Err(err) = self
            .cache
            .set(
                &session_key(account.id),
                &token,
                self.auth_config.token_ttl_secs,
            )
            .await
        {
            warn!(account_id = %account.id, error = %err, "session write failed; revocation degraded");
        }

        Ok(AuthSuccess {
            user: AccountPublic::from(account),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionCache;
    use crate::auth::test_support::{seeded_store, FailingSessionCache, MemoryCredentialStore};
    use quill_core::STATUS_DISABLED;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "service-test-secret-0123456789abcdef".to_string(),
            token_ttl_secs: 3600,
            issuer: "quill-api".to_string(),
        }
    }

    fn fast_password_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn service_with(
        store: Arc<MemoryCredentialStore>,
        cache: Arc<dyn SessionCache>,
    ) -> AuthService {
        AuthService::new(store, cache, test_auth_config())
            .with_password_config(fast_password_config())
    }

    fn service() -> (AuthService, Arc<MemoryCredentialStore>) {
        let store = Arc::new(seeded_store());
        let cache = Arc::new(MemorySessionCache::new());
        (service_with(store.clone(), cache), store)
    }

    #[tokio::test]
    async fn test_login_then_verify_returns_same_identity() {
        let (service, _) = service();

        let success = service.login("alice", "Secret123").await.expect("login");
        let claims = service.verify(&success.token).await.expect("verify");

        assert_eq!(claims.sub, success.user.id.to_string());
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_not_found() {
        let (service, _) = service();

        let result = service.login("nouser", "x").await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_invalid_credentials() {
        let (service, _) = service();

        let result = service.login("alice", "WrongPass1").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_disabled_account_is_rejected() {
        let (service, store) = service();
        store.set_status("alice", STATUS_DISABLED);

        let result = service.login("alice", "Secret123").await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_second_login_revokes_first_token() {
        let (service, _) = service();

        let first = service.login("alice", "Secret123").await.unwrap();
        let second = service.login("alice", "Secret123").await.unwrap();

        assert_ne!(first.token, second.token);
        assert!(matches!(
            service.verify(&first.token).await,
            Err(AuthError::Revoked)
        ));
        assert!(service.verify(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (service, _) = service();

        let success = service.login("alice", "Secret123").await.unwrap();
        service.logout(success.user.id).await;

        assert!(matches!(
            service.verify(&success.token).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let (service, _) = service();

        let original = service.login("alice", "Secret123").await.unwrap();
        let refreshed = service.refresh(&original.token).await.unwrap();

        assert_ne!(original.token, refreshed.token);
        assert!(matches!(
            service.verify(&original.token).await,
            Err(AuthError::Revoked)
        ));
        assert!(service.verify(&refreshed.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_of_deleted_account_is_not_found() {
        let (service, store) = service();

        let success = service.login("alice", "Secret123").await.unwrap();
        store.remove(success.user.id);

        let result = service.refresh(&success.token).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_expired_token_fails_even_while_cached() {
        let store = Arc::new(seeded_store());
        let cache = Arc::new(MemorySessionCache::new());
        let service = service_with(store.clone(), cache.clone());

        let account = store.find_by_username("alice").await.unwrap().unwrap();
        let expired = crate::auth::test_support::issue_expired_token(
            &test_auth_config(),
            &account,
        );
        cache
            .set(&format!("session:{}", account.id), &expired, 3600)
            .await
            .unwrap();

        let result = service.verify(&expired).await;
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn test_tampered_token_is_invalid_signature() {
        let (service, _) = service();

        let success = service.login("alice", "Secret123").await.unwrap();
        let mut tampered = success.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        let result = service.verify(&tampered).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let (service, _) = service();

        let result = service.register("alice", "other@x.com", "Secret123").await;
        assert!(matches!(
            result,
            Err(AuthError::Conflict { field: "username" })
        ));

        let result = service.register("bob", "a@x.com", "Secret123").await;
        assert!(matches!(result, Err(AuthError::Conflict { field: "email" })));
    }

    #[tokio::test]
    async fn test_register_race_on_insert_is_conflict() {
        use async_trait::async_trait;

        // Simulates losing a registration race: both find checks see
        // nothing, then the insert hits the unique constraint.
        struct RacingStore;

        #[async_trait]
        impl CredentialStore for RacingStore {
            async fn find_by_username(&self, _: &str) -> Result<Option<Account>, StoreError> {
                Ok(None)
            }
            async fn find_by_email(&self, _: &str) -> Result<Option<Account>, StoreError> {
                Ok(None)
            }
            async fn find_by_id(&self, _: Uuid) -> Result<Option<Account>, StoreError> {
                Ok(None)
            }
            async fn create(&self, _: NewAccount) -> Result<Account, StoreError> {
                Err(StoreError::Duplicate { field: "username" })
            }
            async fn update_last_login(&self, _: Uuid) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let service = AuthService::new(
            Arc::new(RacingStore),
            Arc::new(MemorySessionCache::new()),
            test_auth_config(),
        )
        .with_password_config(fast_password_config());

        let result = service.register("alice", "a@x.com", "Secret123").await;
        assert!(matches!(
            result,
            Err(AuthError::Conflict { field: "username" })
        ));
    }

    #[tokio::test]
    async fn test_register_weak_password_is_rejected() {
        let (service, _) = service();

        let result = service.register("bob", "b@x.com", "short").await;
        assert!(matches!(result, Err(AuthError::WeakPassword(_))));
    }

    #[tokio::test]
    async fn test_register_login_logout_scenario() {
        let store = Arc::new(MemoryCredentialStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        let service = service_with(store, cache);

        let registered = service
            .register("alice", "a@x.com", "Secret123")
            .await
            .expect("register");
        let t1 = registered.token.clone();

        let claims = service.verify(&t1).await.expect("verify t1");
        assert_eq!(claims.username, "alice");

        let login = service.login("alice", "Secret123").await.expect("login");
        let t2 = login.token.clone();
        assert_ne!(t1, t2);

        assert!(matches!(service.verify(&t1).await, Err(AuthError::Revoked)));
        assert!(service.verify(&t2).await.is_ok());

        service.logout(login.user.id).await;
        assert!(matches!(service.verify(&t2).await, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn test_login_succeeds_when_cache_writes_fail() {
        let store = Arc::new(seeded_store());
        let cache = Arc::new(FailingSessionCache);
        let service = service_with(store, cache);

        let success = service.login("alice", "Secret123").await.expect("login");
        assert!(!success.token.is_empty());
    }

    #[tokio::test]
    async fn test_verify_fails_closed_when_cache_reads_fail() {
        let store = Arc::new(seeded_store());
        let service = service_with(store.clone(), Arc::new(MemorySessionCache::new()));

        let success = service.login("alice", "Secret123").await.unwrap();

        // Same secret, but every cache read errors out.
        let degraded = service_with(store, Arc::new(FailingSessionCache));
        let result = degraded.verify(&success.token).await;
        assert!(matches!(result, Err(AuthError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn test_logout_swallows_cache_failure() {
        let store = Arc::new(seeded_store());
        let service = service_with(store, Arc::new(FailingSessionCache));

        // Must not panic or surface an error.
        service.logout(Uuid::new_v4()).await;
    }
}
