//! Identities and the claim set carried by a token.

use crate::error::TokenError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated principal, as produced by an authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login name. Becomes the `sub` claim.
    pub username: String,

    /// Granted authorities, e.g. `ROLE_USER`. Order is kept.
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            username: username.into(),
            authorities,
        }
    }
}

/// Claim set of an issued token.
///
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the identity's username).
    #[serde(rename = "sub")]
    pub subject: String,

    /// Authorities copied from the identity.
    #[serde(default)]
    pub authorities: Vec<String>,

    /// Issuer.
    #[serde(rename = "iss")]
    pub issuer: String,

    /// Issued-at.
    #[serde(rename = "iat")]
    pub issued_at: i64,

    /// Expiration.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    /// Build the claim set for `identity`, valid from `now` for `lifetime`.
    pub fn build(
        identity: &Identity,
        issuer: &str,
        lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        if identity.username.trim().is_empty() {
            return Err(TokenError::ClaimBuild("username must not be empty".to_string()));
        }
        let lifetime = whole_seconds(lifetime).ok_or_else(|| {
            TokenError::ClaimBuild(
                "token lifetime must be a positive whole number of seconds".to_string(),
            )
        })?;

        let issued_at = now.timestamp();
        let expires_at = issued_at
            .checked_add(lifetime)
            .ok_or_else(|| TokenError::ClaimBuild("expiration overflows".to_string()))?;

        Ok(Self {
            subject: identity.username.clone(),
            authorities: identity.authorities.clone(),
            issuer: issuer.to_string(),
            issued_at,
            expires_at,
        })
    }

    /// Whether the token is expired at `now`, allowing `leeway` seconds of
    /// clock skew. A token is valid only while `now < exp + leeway`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        now.timestamp() >= self.expires_at.saturating_add(leeway.num_seconds())
    }

    /// Seconds left before expiry, zero once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Duration {
        let left = self.expires_at.saturating_sub(now.timestamp());
        Duration::seconds(left.max(0))
    }

    pub fn issued_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }

    pub fn expires_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }
}

/// `duration` as a count of seconds, if it is at least one second and has no
/// fractional part.
pub(crate) fn whole_seconds(duration: Duration) -> Option<i64> {
    let secs = duration.num_seconds();
    (secs >= 1 && Duration::try_seconds(secs) == Some(duration)).then_some(secs)
}
