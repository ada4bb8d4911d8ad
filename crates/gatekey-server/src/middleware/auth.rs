use crate::error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use gatekey_core::HeaderConfig;
use std::sync::Arc;

/// Axum middleware admitting only requests that carry a valid token.
///
/// The verified `Claims` are inserted into the request extensions. Every
/// failure produces the same 401 response; the reason is logged.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = &state.cfg.jwt.header;
    let Some(token) = extract_token(req.headers(), header) else {
        tracing::debug!(header = %header.name, path = %req.uri().path(), "Request without token");
        return Err(AuthError::MissingToken(header.name.clone()));
    };

    let claims = state.engine.verify(token).map_err(|e| {
        tracing::warn!(reason = e.kind(), path = %req.uri().path(), "Token rejected");
        AuthError::from(e)
    })?;

    tracing::debug!(subject = %claims.subject, "Token accepted");
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Token from the configured header, with the prefix stripped.
fn extract_token<'a>(headers: &'a HeaderMap, header: &HeaderConfig) -> Option<&'a str> {
    let value = headers.get(header.name.as_str())?.to_str().ok()?;
    header.strip(value)
}
