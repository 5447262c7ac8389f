//! JWT token issuance and validation
//!
//! Implements the stateless token codec with HMAC-SHA256 signing.
//! Tokens carry the account identity claims and an absolute expiry;
//! decoding never consults an external store.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quill_core::{Account, AuthConfig};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Identity claims embedded in every issued token.
///
/// Claims are immutable once issued: a role or status change does not
/// propagate to tokens already in flight until they expire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account ID
    pub sub: String,
    /// Account username
    pub username: String,
    /// Account email address
    pub email: String,
    /// Account role (admin or user)
    pub role: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

/// Token codec errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Issue a signed token for an account with expiry `now + ttl`.
pub fn issue_token(config: &AuthConfig, account: &Account) -> Result<String, JwtError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: account.id.to_string(),
        username: account.username.clone(),
        email: account.email.clone(),
        role: account.role.clone(),
        iat: now,
        exp: now + config.token_ttl_secs,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a token's signature and expiry and extract its claims.
///
/// `Expired` and `InvalidSignature` are distinguishable so callers can
/// produce different user-facing messages; every malformed or tampered
/// token collapses into `InvalidSignature`.
pub fn decode_token(config: &AuthConfig, token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    // No leeway: a token is invalid the moment its expiry passes.
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::InvalidSignature,
    })?;

    Ok(token_data.claims)
}
