//! Quill Core - Domain models and shared types
//!
//! This crate defines the abstractions shared across the Quill backend:
//! - Account model and its public projection
//! - Configuration management

pub mod config;

pub use config::{AppConfig, AuthConfig, CacheConfig, ConfigError, DatabaseConfig, ServerConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account status: only `active` accounts may authenticate.
pub const STATUS_ACTIVE: &str = "active";
/// Account status for administratively disabled accounts.
pub const STATUS_DISABLED: &str = "disabled";

/// The only privileged role; everything else is a regular user.
pub const ROLE_ADMIN: &str = "admin";
/// Default role assigned at registration.
pub const ROLE_USER: &str = "user";

/// A stored account record, including the credential hash.
///
/// This is the shape returned by the credential store. It must never be
/// serialized into an HTTP response; use [`AccountPublic`] for that.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Public projection of an account, safe to return to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountPublic {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role.clone(),
            status: account.status.clone(),
            created_at: account.created_at,
        }
    }
}
