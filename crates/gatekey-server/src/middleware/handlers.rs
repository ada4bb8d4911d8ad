use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use gatekey_token::{Claims, Jwks};
use serde_json::json;
use std::sync::Arc;

/// Login endpoint: authenticate, then respond with the token header.
pub async fn login(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let interceptor = &state.interceptor;
    let result = match interceptor.attempt_authentication(req).await {
        Ok(identity) => interceptor.on_success(&identity),
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Authentication failed");
            e.into_response()
        }
    }
}

/// Echo the verified claims of the caller.
pub async fn whoami(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}

pub async fn jwks(State(state): State<Arc<AppState>>) -> Json<Jwks> {
    Json(state.engine.jwks())
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "service": "gatekey-server" }))
}
