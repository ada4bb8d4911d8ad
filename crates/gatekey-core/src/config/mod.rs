//! Configuration types for gatekey.
//!
//! Configuration is loaded from a single YAML (or TOML) file and is
//! read-only for the lifetime of the process.
//!
//! # Sections
//!
//! - **jwt**: token lifetime, issuer, transport header and signing key source
//! - **server**: bind address for the HTTP server
//! - **users**: accounts for the built-in credential store

pub mod jwt;
pub mod keys;
pub mod server;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use jwt::{HeaderConfig, JwtConfig};
pub use keys::{KeysConfig, MIN_RSA_BITS};
pub use server::{ServerConfig, UserEntry};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GATEKEY_CONFIG";

/// Complete gatekey configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatekeyConfig {
    /// Token policy.
    #[serde(default)]
    pub jwt: JwtConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Accounts for the built-in credential store.
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl GatekeyConfig {
    /// Load and validate configuration from a file.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = if path.extension().map(|e| e == "toml").unwrap_or(false) {
            Self::from_toml(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Check the invariants the token engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.jwt;
        if jwt.expiration == 0 {
            return Err(ConfigError::Invalid(
                "jwt.expiration must be a positive number of seconds".to_string(),
            ));
        }
        if i64::try_from(jwt.expiration).is_err() {
            return Err(ConfigError::Invalid("jwt.expiration is too large".to_string()));
        }
        if jwt.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt.issuer must not be empty".to_string()));
        }
        if jwt.header.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jwt.header.name must not be empty".to_string(),
            ));
        }
        if !jwt.login_url.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "jwt.login_url must start with '/': {}",
                jwt.login_url
            )));
        }
        // Exact paths only: no wildcards, captures or pattern braces.
        if jwt.login_url.split('/').any(|segment| {
            segment.starts_with('*') || segment.starts_with(':') || segment.contains(['{', '}'])
        }) {
            return Err(ConfigError::Invalid(format!(
                "jwt.login_url must be an exact path without wildcards or captures: {}",
                jwt.login_url
            )));
        }
        if jwt.keys.bits < MIN_RSA_BITS {
            return Err(ConfigError::Invalid(format!(
                "jwt.keys.bits must be at least {MIN_RSA_BITS}, got {}",
                jwt.keys.bits
            )));
        }
        Ok(())
    }
}
