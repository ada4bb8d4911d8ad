//! Token policy configuration.
//!
//! One process-wide policy: the expiration and issuer are read once at
//! startup and apply to every token the process issues.

use serde::{Deserialize, Serialize};

use super::keys::KeysConfig;

/// Configuration for token issuance and verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Path the login endpoint is mounted on.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Token lifetime in seconds.
    #[serde(default = "default_expiration")]
    pub expiration: u64,

    /// Value of the `iss` claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Clock-skew tolerance in seconds applied to the expiry check.
    #[serde(default)]
    pub leeway: u64,

    /// Transport header settings.
    #[serde(default)]
    pub header: HeaderConfig,

    /// Signing key source.
    #[serde(default)]
    pub keys: KeysConfig,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            expiration: default_expiration(),
            issuer: default_issuer(),
            leeway: 0,
            header: HeaderConfig::default(),
            keys: KeysConfig::default(),
        }
    }
}

/// Header used to carry the token on requests and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    /// Header name, e.g. `Authorization`.
    #[serde(default = "default_header_name")]
    pub name: String,

    /// Prefix placed before the token, e.g. `Bearer `.
    #[serde(default = "default_header_prefix")]
    pub prefix: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            name: default_header_name(),
            prefix: default_header_prefix(),
        }
    }
}

impl HeaderConfig {
    /// Format a header value carrying `token`.
    pub fn format(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }

    /// Strip the configured prefix from a header value.
    ///
    /// The prefix is an auth scheme and matches case-insensitively. Returns
    /// `None` if the prefix is missing or nothing follows it.
    pub fn strip<'a>(&self, value: &'a str) -> Option<&'a str> {
        let split = self.prefix.len();
        if !value.get(..split)?.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }
        let rest = value.get(split..)?.trim();
        if rest.is_empty() { None } else { Some(rest) }
    }
}

fn default_login_url() -> String {
    "/login".to_string()
}

fn default_expiration() -> u64 {
    3600
}

fn default_issuer() -> String {
    "http://academy.devdojo".to_string()
}

fn default_header_name() -> String {
    "Authorization".to_string()
}

fn default_header_prefix() -> String {
    "Bearer ".to_string()
}
