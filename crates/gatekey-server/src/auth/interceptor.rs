use crate::auth::authenticator::{Authenticator, Credentials};
use crate::error::AuthError;
use async_trait::async_trait;
use axum::{
    Json,
    body::to_bytes,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use gatekey_core::HeaderConfig;
use gatekey_token::{Identity, TokenEngine};
use serde_json::json;
use std::sync::Arc;

/// Largest login body accepted.
const MAX_LOGIN_BODY: usize = 16 * 1024;

/// Login step of the request pipeline: turn a request into an identity, then
/// turn that identity into the success response.
#[async_trait]
pub trait AuthenticationInterceptor: Send + Sync {
    async fn attempt_authentication(&self, request: Request) -> Result<Identity, AuthError>;

    fn on_success(&self, identity: &Identity) -> Result<Response, AuthError>;
}

/// Reads `{"username","password"}` JSON, checks it with an [`Authenticator`]
/// and answers with a signed token in the configured header.
pub struct LoginInterceptor {
    authenticator: Arc<dyn Authenticator>,
    engine: Arc<TokenEngine>,
    header_name: HeaderName,
    header: HeaderConfig,
}

impl LoginInterceptor {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        engine: Arc<TokenEngine>,
        header: HeaderConfig,
    ) -> Result<Self, AuthError> {
        let header_name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| AuthError::Internal(format!("invalid header name {:?}: {e}", header.name)))?;
        Ok(Self {
            authenticator,
            engine,
            header_name,
            header,
        })
    }
}

#[async_trait]
impl AuthenticationInterceptor for LoginInterceptor {
    async fn attempt_authentication(&self, request: Request) -> Result<Identity, AuthError> {
        tracing::info!("Attempting authentication");

        let body = to_bytes(request.into_body(), MAX_LOGIN_BODY)
            .await
            .map_err(|e| AuthError::BadRequest(e.to_string()))?;
        if body.is_empty() {
            return Err(AuthError::BadRequest("empty body".to_string()));
        }
        let credentials: Credentials =
            serde_json::from_slice(&body).map_err(|e| AuthError::BadRequest(e.to_string()))?;

        self.authenticator.authenticate(&credentials).await
    }

    fn on_success(&self, identity: &Identity) -> Result<Response, AuthError> {
        tracing::info!(username = %identity.username, "Authentication was successful for the user");

        let token = self.engine.issue(identity)?;
        let value = HeaderValue::from_str(&self.header.format(token.as_str()))
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let claims = token.claims();
        let body = Json(json!({
            "subject": claims.subject,
            "authorities": claims.authorities,
            "expires_at": claims.expires_at,
        }));

        let mut response = (StatusCode::OK, body).into_response();
        response.headers_mut().insert(self.header_name.clone(), value);
        Ok(response)
    }
}
