use crate::auth::{AuthenticationInterceptor, Authenticator, LoginInterceptor, StaticUserAuthenticator};
use anyhow::Context;
use gatekey_core::GatekeyConfig;
use gatekey_token::{RsaKeyProvider, TokenEngine};
use std::sync::Arc;

/// Paths served by the router itself; the login URL may not shadow them.
const RESERVED_PATHS: &[&str] = &["/whoami", "/healthz", "/.well-known/jwks.json"];

/// Shared application state.
///
/// Built once at startup and read-only afterwards.
pub struct AppState {
    pub cfg: GatekeyConfig,
    pub engine: Arc<TokenEngine>,
    pub interceptor: Arc<dyn AuthenticationInterceptor>,
}

impl AppState {
    pub fn new(
        cfg: GatekeyConfig,
        engine: Arc<TokenEngine>,
        authenticator: Arc<dyn Authenticator>,
    ) -> anyhow::Result<Self> {
        cfg.validate()?;
        anyhow::ensure!(
            !RESERVED_PATHS.contains(&cfg.jwt.login_url.as_str()),
            "jwt.login_url {} collides with a built-in route",
            cfg.jwt.login_url
        );

        let interceptor =
            LoginInterceptor::new(authenticator, engine.clone(), cfg.jwt.header.clone())?;

        Ok(Self {
            cfg,
            engine,
            interceptor: Arc::new(interceptor),
        })
    }

    /// Load the signing key (or generate one) and the configured users.
    pub async fn init(cfg: GatekeyConfig) -> anyhow::Result<Self> {
        let jwt = cfg.jwt.clone();
        let engine = tokio::task::spawn_blocking(move || {
            let provider = RsaKeyProvider::new(jwt.keys.bits)?;
            TokenEngine::from_config(&jwt, &provider)
        })
        .await
        .context("key initialization task panicked")?
        .context("failed to initialize token engine")?;

        let authenticator = StaticUserAuthenticator::from_entries(&cfg.users)
            .context("failed to load users")?;
        tracing::info!(users = authenticator.len(), "Loaded credential store");

        Self::new(cfg, Arc::new(engine), Arc::new(authenticator))
    }
}
