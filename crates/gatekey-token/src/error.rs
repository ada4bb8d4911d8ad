//! Error types for token issuance and verification.

use thiserror::Error;

/// Errors that can occur during key handling, issuance or verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The cryptographic provider could not produce a key pair.
    #[error("failed to generate key pair: {0}")]
    KeyGeneration(String),

    /// Key material could not be parsed or encoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The identity handed in for issuance is unusable.
    #[error("failed to build claims: {0}")]
    ClaimBuild(String),

    /// The signing step failed.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// The token could not be parsed.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The signature does not match the header and claims.
    #[error("token signature does not match")]
    SignatureMismatch,

    /// The token was issued by someone else.
    #[error("token issuer {found:?} is not trusted")]
    IssuerMismatch { found: String },

    /// The token is past its expiry.
    #[error("token has expired at {expired_at}")]
    Expired { expired_at: i64 },

    /// No verification key is known for the token's key id.
    #[error("no verification key for key id {kid:?}")]
    UnknownKey { kid: Option<String> },

    /// IO error (reading/writing keys).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TokenError {
    /// Returns `true` for failures that mean "treat the request as
    /// unauthenticated".
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::SignatureMismatch
                | Self::IssuerMismatch { .. }
                | Self::Expired { .. }
                | Self::UnknownKey { .. }
        )
    }

    /// Short machine-readable name, for logs only. Never sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeyGeneration(_) => "key_generation",
            Self::InvalidKey(_) => "invalid_key",
            Self::ClaimBuild(_) => "claim_build",
            Self::Signing(_) => "signing",
            Self::MalformedToken(_) => "malformed_token",
            Self::SignatureMismatch => "signature_mismatch",
            Self::IssuerMismatch { .. } => "issuer_mismatch",
            Self::Expired { .. } => "expired",
            Self::UnknownKey { .. } => "unknown_key",
            Self::Io(_) => "io",
        }
    }
}
