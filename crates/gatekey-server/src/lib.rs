//! # gatekey-server
//!
//! HTTP surface around the token engine:
//!
//! - `POST <jwt.login_url>` checks a username/password and returns a token
//!   in the configured header
//! - `GET /whoami` requires a token and echoes its claims
//! - `GET /.well-known/jwks.json` publishes the verification keys
//! - `GET /healthz`

pub mod auth;
pub mod error;
pub mod middleware;
pub mod state;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use gatekey_core::GatekeyConfig;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::AuthError;
pub use state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/whoami", get(middleware::handlers::whoami))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_token,
        ));

    Router::new()
        .route(&state.cfg.jwt.login_url, post(middleware::handlers::login))
        .route("/.well-known/jwks.json", get(middleware::handlers::jwks))
        .route("/healthz", get(middleware::handlers::healthz))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize state from `cfg` and serve until the process is stopped.
pub async fn serve(cfg: GatekeyConfig) -> anyhow::Result<()> {
    let addr = cfg.server.bind.clone();
    let state = Arc::new(AppState::init(cfg).await?);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        login_url = %state.cfg.jwt.login_url,
        kid = %state.engine.keys().active().kid(),
        "gatekey-server listening on {}",
        addr
    );

    axum::serve(listener, app).await?;
    Ok(())
}
