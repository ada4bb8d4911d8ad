//! HTTP server and reference credential store configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// A user known to the built-in credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    /// Login name, becomes the token subject.
    pub username: String,

    /// Argon2 PHC string (see `gatekey hash-password`).
    pub password_hash: String,

    /// Authorities granted to this user, in order.
    #[serde(default)]
    pub authorities: Vec<String>,
}
