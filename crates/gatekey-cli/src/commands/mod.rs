//! CLI command implementations for gatekey.

pub mod keys;
pub mod password;
pub mod serve;
pub mod token;

use anyhow::Context;
use gatekey_core::GatekeyConfig;
use std::path::Path;

/// Load the configuration file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GatekeyConfig> {
    match path {
        Some(path) => GatekeyConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(GatekeyConfig::default()),
    }
}
