//! Authentication and token-lifecycle module
//!
//! Components:
//! - Token codec: stateless JWT issuance/validation (HMAC-SHA256)
//! - Password hashing with Argon2id
//! - Session cache: Redis-backed single-active-token enforcement
//! - Credential store adapter over PostgreSQL
//! - Auth service orchestrating login, registration, logout, verify, refresh
//! - Request-gating middleware

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;
pub mod session;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use jwt::{decode_token, issue_token, Claims, JwtError};
pub use middleware::{optional_auth, require_auth, AuthenticatedUser, GateError};
pub use service::{AuthError, AuthService, AuthSuccess};
pub use session::{CacheError, MemorySessionCache, RedisSessionCache, SessionCache};
pub use store::{CredentialStore, NewAccount, PgCredentialStore, StoreError};
