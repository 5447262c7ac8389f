//! Authentication API handlers
//!
//! HTTP endpoints for login, registration, logout, token refresh and
//! verification. Every response is wrapped in the uniform envelope.

use crate::auth::jwt::Claims;
use crate::auth::{AuthSuccess, AuthenticatedUser};
use crate::error::{AppError, Envelope};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

/// Token verification request
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// New token returned by refresh
#[derive(Debug, Serialize)]
pub struct TokenData {
    pub token: String,
}

/// Identity claims echoed back by verification
#[derive(Debug, Serialize)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<Claims> for SessionIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            id: Uuid::parse_str(&claims.sub).unwrap_or_else(|_| Uuid::nil()),
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Verification result
#[derive(Debug, Serialize)]
pub struct VerifyData {
    pub valid: bool,
    pub user: SessionIdentity,
}

/// `POST /api/v1/auth/login`
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let success: AuthSuccess = state
        .auth
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(Envelope::ok("Login successful", success)))
}

/// `POST /api/v1/auth/register`
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let success = state
        .auth
        .register(&request.username, &request.email, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok("Registration successful", success)),
    ))
}

/// `POST /api/v1/auth/logout` (requires bearer token)
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    state.auth.logout(user.account_id).await;

    Json(Envelope::message("Logged out successfully"))
}

/// `POST /api/v1/auth/refresh`
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let success = state.auth.refresh(&request.token).await?;

    Ok(Json(Envelope::ok(
        "Token refreshed",
        TokenData {
            token: success.token,
        },
    )))
}

/// `POST /api/v1/auth/verify`
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.auth.verify(&request.token).await?;

    Ok(Json(Envelope::ok(
        "Token is valid",
        VerifyData {
            valid: true,
            user: SessionIdentity::from(claims),
        },
    )))
}

/// `GET /api/v1/auth/me` (requires bearer token)
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.auth.get_account(user.account_id).await?;

    Ok(Json(Envelope::ok("Current account", account)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_identity_from_claims() {
        let id = Uuid::new_v4();
        let claims = Claims {
            iss: "quill-api".to_string(),
            sub: id.to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            role: "user".to_string(),
            iat: 0,
            exp: 0,
        };

        let identity = SessionIdentity::from(claims);
        assert_eq!(identity.id, id);
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn test_verify_data_serialization() {
        let data = VerifyData {
            valid: true,
            user: SessionIdentity {
                id: Uuid::new_v4(),
                username: "alice".to_string(),
                email: "a@x.com".to_string(),
                role: "user".to_string(),
            },
        };

        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"valid\":true"));
        assert!(json.contains("alice"));
    }
}
