//! Authentication errors and their HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatekey_token::TokenError;
use serde_json::json;

/// Body returned for every authentication failure.
pub const AUTH_FAILED: &str = "authentication failed";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The login request could not be parsed.
    #[error("invalid login request: {0}")]
    BadRequest(String),

    /// Unknown user or wrong password.
    #[error("bad credentials")]
    BadCredentials,

    /// No token in the configured header.
    #[error("missing or malformed {0} header")]
    MissingToken(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::BadCredentials | AuthError::MissingToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Token(e) if e.is_verification_failure() => StatusCode::UNAUTHORIZED,
            AuthError::Token(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // The specific reason stays in the logs.
        let message = match status {
            StatusCode::BAD_REQUEST => "invalid login request",
            StatusCode::UNAUTHORIZED => AUTH_FAILED,
            _ => "internal error",
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
