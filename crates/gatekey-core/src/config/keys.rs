//! Signing key configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Smallest RSA modulus accepted for signing keys.
pub const MIN_RSA_BITS: usize = 2048;

/// Where the durable signing key comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Environment variable containing the private key (PEM).
    #[serde(default = "default_private_key_env")]
    pub private_key_env: Option<String>,

    /// Path to the private key file (PEM, PKCS#1 or PKCS#8).
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// RSA modulus size used when a key has to be generated.
    #[serde(default = "default_bits")]
    pub bits: usize,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
            private_key_file: None,
            bits: default_bits(),
        }
    }
}

impl KeysConfig {
    /// Resolve the private key PEM from environment or file.
    ///
    /// Returns `Ok(None)` only when no file is configured and the environment
    /// variable is unset, in which case the caller generates an ephemeral
    /// key. A configured file that cannot be read is an error.
    pub fn resolve_private_key(&self) -> Result<Option<String>, std::io::Error> {
        // Try environment variable first
        if let Some(env_var) = &self.private_key_env {
            if let Ok(key) = std::env::var(env_var) {
                if !key.trim().is_empty() {
                    return Ok(Some(key));
                }
            }
        }

        // Try file path
        if let Some(path) = &self.private_key_file {
            let key = std::fs::read_to_string(path).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("private key file {}: {e}", path.display()),
                )
            })?;
            return Ok(Some(key.trim().to_string()));
        }

        Ok(None)
    }
}

fn default_private_key_env() -> Option<String> {
    Some("GATEKEY_PRIVATE_KEY".to_string())
}

fn default_bits() -> usize {
    MIN_RSA_BITS
}
