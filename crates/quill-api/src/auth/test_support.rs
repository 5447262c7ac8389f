//! In-memory fakes and helpers for exercising the auth core without
//! Postgres or Redis. Compiled for unit tests and behind the
//! `test-utils` feature for integration tests.

use super::jwt::Claims;
use super::password::{hash_password_with_config, PasswordConfig};
use super::session::{CacheError, MemorySessionCache, SessionCache};
use super::store::{CredentialStore, NewAccount, StoreError};
use crate::state::AppState;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use quill_core::{Account, AppConfig, AuthConfig, STATUS_ACTIVE};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Fixed signing config shared by the HTTP-level tests.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret-0123456789abcdef".to_string(),
        token_ttl_secs: 3600,
        issuer: "quill-api".to_string(),
    }
}

/// Light Argon2 parameters to keep tests fast.
pub fn fast_password_config() -> PasswordConfig {
    PasswordConfig {
        memory_cost: 4096,
        time_cost: 1,
        parallelism: 1,
    }
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        self.accounts.lock().unwrap().insert(account.id, account);
    }

    pub fn set_status(&self, username: &str, status: &str) {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.values_mut().find(|a| a.username == username) {
            account.status = status.to_string();
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.accounts.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();

        // Mirror the table's unique constraints.
        if accounts.values().any(|a| a.username == account.username) {
            return Err(StoreError::Duplicate { field: "username" });
        }
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }

        let created = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            status: STATUS_ACTIVE.to_string(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.get_mut(&id) {
            account.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// A store seeded with one active account: `alice` / `Secret123`.
pub fn seeded_store() -> MemoryCredentialStore {
    let store = MemoryCredentialStore::new();
    store.insert(Account {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
        email: "a@x.com".to_string(),
        password_hash: hash_password_with_config("Secret123", &fast_password_config()).unwrap(),
        role: "user".to_string(),
        status: STATUS_ACTIVE.to_string(),
        created_at: Utc::now(),
        last_login_at: None,
    });
    store
}

/// Session cache whose every operation fails, for outage scenarios.
pub struct FailingSessionCache;

#[async_trait]
impl SessionCache for FailingSessionCache {
    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("injected failure".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("injected failure".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("injected failure".to_string()))
    }
}

/// Sign a token for `account` that expired an hour ago.
pub fn issue_expired_token(config: &AuthConfig, account: &Account) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: account.id.to_string(),
        username: account.username.clone(),
        email: account.email.clone(),
        role: account.role.clone(),
        iat: now - 7200,
        exp: now - 3600,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

/// Application state wired to in-memory fakes.
pub fn test_state() -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.auth = test_auth_config();

    let store = Arc::new(MemoryCredentialStore::new());
    let cache = Arc::new(MemorySessionCache::new());

    Arc::new(
        AppState::new(config, store, cache).with_password_config(fast_password_config()),
    )
}

/// A full router over in-memory fakes, for `oneshot`-style HTTP tests.
pub fn test_router() -> axum::Router {
    crate::routes::create_router(test_state())
}
