//! API error handling and the uniform response envelope

use crate::auth::service::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Uniform response envelope wrapping every API payload.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            code: "OK".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "OK".to_string(),
            message: message.into(),
            data: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }
}

/// Application error type, mapped onto HTTP responses.
///
/// `InvalidToken` deliberately covers both a bad signature and a revoked
/// session so that clients cannot probe which case occurred; the finer
/// kinds are kept apart internally and logged at the call sites.
#[derive(Debug)]
pub enum AppError {
    InvalidCredentials,
    AccountDisabled,
    Conflict(&'static str),
    NotFound(String),
    TokenExpired,
    InvalidToken,
    ServiceUnavailable,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, envelope) = match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Envelope::error("INVALID_CREDENTIALS", "Invalid username or password"),
            ),
            AppError::AccountDisabled => (
                StatusCode::FORBIDDEN,
                Envelope::error("ACCOUNT_DISABLED", "Account is disabled"),
            ),
            AppError::Conflict(field) => (
                StatusCode::CONFLICT,
                Envelope::error("CONFLICT", format!("{field} is already taken")),
            ),
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Envelope::error("NOT_FOUND", msg))
            }
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                Envelope::error("TOKEN_EXPIRED", "Token expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                Envelope::error("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Envelope::error("SERVICE_UNAVAILABLE", "Service temporarily unavailable"),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Envelope::error("BAD_REQUEST", msg),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Envelope::error("INTERNAL_ERROR", "Internal server error"),
                )
            }
        };

        (status, Json(envelope)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::AccountDisabled => AppError::AccountDisabled,
            AuthError::Conflict { field } => AppError::Conflict(field),
            AuthError::NotFound => AppError::NotFound("Account not found".to_string()),
            AuthError::Expired => AppError::TokenExpired,
            // Signature and revocation failures collapse for clients.
            AuthError::InvalidSignature | AuthError::Revoked => AppError::InvalidToken,
            AuthError::ServiceUnavailable => AppError::ServiceUnavailable,
            AuthError::WeakPassword(msg) => AppError::BadRequest(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
