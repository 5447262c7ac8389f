//! Request gate: authentication middleware for protected routes
//!
//! Extracts the bearer token from the Authorization header, delegates to
//! the auth service for verification, and attaches the resolved identity
//! to request extensions. The client-facing rejection deliberately does
//! not distinguish a forged token from a revoked one; the distinct kinds
//! are logged for observability.

use super::jwt::Claims;
use super::service::AuthError;
use crate::error::Envelope;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Authenticated identity attached to request extensions.
///
/// Handlers extract it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == quill_core::ROLE_ADMIN
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            account_id: Uuid::parse_str(&claims.sub).unwrap_or_else(|_| Uuid::nil()),
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Gate rejection kinds, already collapsed for the client.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Missing or malformed Authorization header")]
    MissingBearer,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Verification backend unavailable")]
    Unavailable,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, envelope) = match self {
            GateError::MissingBearer => (
                StatusCode::UNAUTHORIZED,
                Envelope::error("UNAUTHORIZED", "Authentication required"),
            ),
            GateError::Expired => (
                StatusCode::UNAUTHORIZED,
                Envelope::error("TOKEN_EXPIRED", "Token expired"),
            ),
            GateError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                Envelope::error("INVALID_TOKEN", "Invalid token"),
            ),
            GateError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Envelope::error("SERVICE_UNAVAILABLE", "Service temporarily unavailable"),
            ),
        };

        (status, Json(envelope)).into_response()
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, GateError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(GateError::MissingBearer)?
        .to_str()
        .map_err(|_| GateError::MissingBearer)?
        .strip_prefix("Bearer ")
        .ok_or(GateError::MissingBearer)
}

/// Middleware requiring a verified token.
///
/// Missing or malformed headers are rejected before the auth service is
/// consulted at all.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, GateError> {
    let token = bearer_token(&request)?;

    let claims = state.auth.verify(token).await.map_err(|err| match err {
        AuthError::Expired => GateError::Expired,
        AuthError::InvalidSignature | AuthError::Revoked => {
            tracing::warn!(kind = %err, "rejected bearer token");
            GateError::InvalidToken
        }
        AuthError::ServiceUnavailable => GateError::Unavailable,
        other => {
            tracing::error!(error = %other, "unexpected verification failure");
            GateError::InvalidToken
        }
    })?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}

/// Optional variant of the gate.
///
/// Attaches the identity when a valid token is presented and otherwise
/// lets the request through as anonymous, for endpoints that serve both
/// authenticated and anonymous callers.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Ok(token) = bearer_token(&request) {
        match state.auth.verify(token).await {
            Ok(claims) => {
                request
                    .extensions_mut()
                    .insert(AuthenticatedUser::from(claims));
            }
            Err(err) => {
                tracing::debug!(kind = %err, "optional gate: proceeding anonymously");
            }
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_user_from_claims() {
        let id = Uuid::new_v4();
        let claims = Claims {
            iss: "quill-api".to_string(),
            sub: id.to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            role: "user".to_string(),
            iat: 1000,
            exp: 2000,
        };

        let user = AuthenticatedUser::from(claims);

        assert_eq!(user.account_id, id);
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_is_admin() {
        let admin = AuthenticatedUser {
            account_id: Uuid::new_v4(),
            username: "root".to_string(),
            email: "root@x.com".to_string(),
            role: "admin".to_string(),
        };
        assert!(admin.is_admin());
    }

    #[tokio::test]
    async fn test_optional_gate_proceeds_anonymously() {
        use crate::auth::test_support::test_state;
        use axum::{middleware::from_fn_with_state, routing::get, Extension, Router};
        use tower::ServiceExt;

        async fn whoami(user: Option<Extension<AuthenticatedUser>>) -> String {
            user.map(|Extension(u)| u.username)
                .unwrap_or_else(|| "anonymous".to_string())
        }

        let state = test_state();
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(state.clone(), optional_auth))
            .with_state(state.clone());

        let token = state
            .auth
            .register("alice", "a@x.com", "Secret123")
            .await
            .unwrap()
            .token;

        // Valid token: identity attached.
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice");

        // No header: anonymous, not rejected.
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"anonymous");

        // Garbage token: also anonymous.
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .header(header::AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"anonymous");
    }

    #[test]
    fn test_bearer_extraction() {
        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request).unwrap(), "abc.def.ghi");

        let missing = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert!(matches!(
            bearer_token(&missing),
            Err(GateError::MissingBearer)
        ));

        let malformed = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Token abc")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            bearer_token(&malformed),
            Err(GateError::MissingBearer)
        ));
    }
}
