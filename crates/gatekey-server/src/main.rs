use anyhow::Context;
use gatekey_core::{CONFIG_ENV, GatekeyConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = match std::env::var(CONFIG_ENV) {
        Ok(path) => GatekeyConfig::from_file(&path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        Err(_) => {
            tracing::warn!("{} not set, using default configuration", CONFIG_ENV);
            GatekeyConfig::default()
        }
    };

    gatekey_server::serve(cfg).await
}
