//! Serve command for starting the gatekey HTTP server.
//!
//! `gatekey serve` - Start the login / verification server.

use crate::commands::load_config;
use std::path::PathBuf;

/// Run the server until interrupted.
pub async fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = load_config(config.as_deref())?;
    match &config {
        Some(path) => tracing::info!(config = %path.display(), "Loaded configuration"),
        None => tracing::warn!("No configuration file given, using defaults"),
    }

    gatekey_server::serve(cfg).await
}
