//! Token issuance and verification.

use crate::claims::{Claims, Identity, whole_seconds};
use crate::clock::{Clock, SystemClock};
use crate::error::TokenError;
use crate::keys::{Jwks, KeyProvider, KeyResolver, KeyRing};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use gatekey_core::JwtConfig;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use std::fmt;
use std::sync::Arc;

/// The only signature algorithm issued or accepted.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

/// Issuer and lifetime applied to every token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    pub issuer: String,
    pub expiration: Duration,
    pub leeway: Duration,
}

impl TokenPolicy {
    pub fn new(issuer: impl Into<String>, expiration: Duration) -> Result<Self, TokenError> {
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(TokenError::ClaimBuild("issuer must not be empty".to_string()));
        }
        if whole_seconds(expiration).is_none() {
            return Err(TokenError::ClaimBuild(
                "expiration must be a positive whole number of seconds".to_string(),
            ));
        }
        Ok(Self {
            issuer,
            expiration,
            leeway: Duration::zero(),
        })
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        let expiration = seconds(config.expiration, "expiration")?;
        let leeway = seconds(config.leeway, "leeway")?;
        Ok(Self::new(config.issuer.clone(), expiration)?.with_leeway(leeway))
    }
}

fn seconds(value: u64, what: &str) -> Result<Duration, TokenError> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| TokenError::ClaimBuild(format!("{what} of {value} seconds is out of range")))
}

/// A compact-serialized, signed token.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedToken {
    value: String,
    claims: Claims,
}

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The claims that were signed.
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl AsRef<str> for SignedToken {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedToken")
            .field("subject", &self.claims.subject)
            .field("expires_at", &self.claims.expires_at)
            .finish_non_exhaustive()
    }
}

/// Checks presented tokens against a policy, resolving keys by `kid`.
///
/// Usable without any private key, e.g. from a public key file.
#[derive(Clone)]
pub struct TokenVerifier {
    policy: TokenPolicy,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(policy: TokenPolicy) -> Self {
        Self {
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Verify a token, resolving its `kid` through `resolver`.
    ///
    /// Checks run in order: structure, algorithm, key, signature, issuer,
    /// expiry. The first failure is returned.
    pub fn verify(&self, token: &str, resolver: &dyn KeyResolver) -> Result<Claims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(TokenError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        }

        let header = decode_header(token)
            .map_err(|e| TokenError::MalformedToken(format!("invalid header: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::MalformedToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        // Only the kid is read from the header; any embedded key is ignored.
        let kid = header.kid.ok_or(TokenError::UnknownKey { kid: None })?;
        let key = resolver
            .resolve(&kid)
            .ok_or_else(|| TokenError::UnknownKey {
                kid: Some(kid.clone()),
            })?;

        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked below against our own clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iss", "iat", "exp"]);

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(map_decode_error)?
            .claims;

        if claims.issuer != self.policy.issuer {
            return Err(TokenError::IssuerMismatch {
                found: claims.issuer,
            });
        }

        if claims.is_expired_at(self.clock.now(), self.policy.leeway) {
            return Err(TokenError::Expired {
                expired_at: claims.expires_at,
            });
        }

        Ok(claims)
    }
}

/// Issues and verifies RS256 tokens with a fixed key ring and policy.
///
/// The engine is immutable and cheap to share behind an `Arc`.
pub struct TokenEngine {
    keys: KeyRing,
    verifier: TokenVerifier,
}

impl fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEngine")
            .field("keys", &self.keys)
            .field("policy", self.policy())
            .finish_non_exhaustive()
    }
}

impl TokenEngine {
    pub fn new(keys: KeyRing, policy: TokenPolicy) -> Self {
        Self {
            keys,
            verifier: TokenVerifier::new(policy),
        }
    }

    /// Build an engine from configuration, loading or generating the signing key.
    pub fn from_config(config: &JwtConfig, provider: &dyn KeyProvider) -> Result<Self, TokenError> {
        let policy = TokenPolicy::from_config(config)?;
        let keys = KeyRing::load_or_generate(&config.keys, provider)?;
        Ok(Self::new(keys, policy))
    }

    /// Replace the time source used for issuance and expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.verifier = self.verifier.with_clock(clock);
        self
    }

    pub fn policy(&self) -> &TokenPolicy {
        self.verifier.policy()
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn jwks(&self) -> Jwks {
        self.keys.jwks()
    }

    /// Issue a signed token for an authenticated identity.
    pub fn issue(&self, identity: &Identity) -> Result<SignedToken, TokenError> {
        let policy = self.policy();
        let now = self.verifier.clock.now();
        let claims = Claims::build(identity, &policy.issuer, policy.expiration, now)?;

        let signing_key = self.keys.active();
        let mut header = Header::new(ALGORITHM);
        header.kid = Some(signing_key.kid().to_string());

        tracing::debug!(kid = %signing_key.kid(), "Signing the token with the private RSA key");
        let value = encode(&header, &claims, signing_key.encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        tracing::info!(
            subject = %claims.subject,
            authorities = claims.authorities.len(),
            expires_at = claims.expires_at,
            "Issued token"
        );

        Ok(SignedToken { value, claims })
    }

    /// Verify a token against this engine's key ring.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verifier.verify(token, &self.keys)
    }

    /// Verify a token, resolving its `kid` through `resolver`.
    pub fn verify_with(
        &self,
        token: &str,
        resolver: &dyn KeyResolver,
    ) -> Result<Claims, TokenError> {
        self.verifier.verify(token, resolver)
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
        _ => TokenError::MalformedToken(err.to_string()),
    }
}

/// Inspect a token without verification (for debugging).
pub fn inspect_token_unverified(token: &str) -> Result<TokenInfo, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    }

    let header = decode_header(token)
        .map_err(|e| TokenError::MalformedToken(format!("invalid header: {e}")))?;
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| TokenError::MalformedToken(format!("invalid claims encoding: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::MalformedToken(format!("invalid claims: {e}")))?;

    Ok(TokenInfo { header, claims })
}

/// Information about a token (for inspection).
#[derive(Debug)]
pub struct TokenInfo {
    pub header: Header,
    /// Raw claim set, unverified.
    pub claims: serde_json::Value,
}

impl TokenInfo {
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(|v| v.as_str())
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get("exp").and_then(|v| v.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::keys::{RsaKeyProvider, SigningKeyPair};
    use chrono::{TimeZone, Utc};
    use std::sync::OnceLock;

    fn shared_key() -> &'static SigningKeyPair {
        static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
        KEY.get_or_init(|| RsaKeyProvider::default().generate_key_pair().unwrap())
    }

    fn engine(clock: Arc<MockClock>) -> TokenEngine {
        let policy = TokenPolicy::new("http://academy.devdojo", Duration::seconds(3600)).unwrap();
        TokenEngine::new(KeyRing::new(shared_key().clone()), policy).with_clock(clock)
    }

    fn clock() -> Arc<MockClock> {
        Arc::new(MockClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    #[test]
    fn test_issue_and_verify() {
        let engine = engine(clock());
        let identity = Identity::new("alice", vec!["ROLE_USER".into()]);

        let token = engine.issue(&identity).unwrap();
        let claims = engine.verify(token.as_str()).unwrap();

        assert_eq!(&claims, token.claims());
        assert_eq!(claims.subject, "alice");
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
    }

    #[test]
    fn test_header_carries_kid_only() {
        let engine = engine(clock());
        let token = engine.issue(&Identity::new("alice", vec![])).unwrap();

        let info = inspect_token_unverified(token.as_str()).unwrap();
        assert_eq!(info.header.alg, Algorithm::RS256);
        assert_eq!(info.header.typ.as_deref(), Some("JWT"));
        assert_eq!(info.header.kid.as_deref(), Some(shared_key().kid()));
        assert!(info.header.jwk.is_none());
        assert_eq!(info.subject(), Some("alice"));
    }

    #[test]
    fn test_policy_from_config() {
        let config = JwtConfig {
            expiration: 60,
            leeway: 5,
            ..JwtConfig::default()
        };
        let policy = TokenPolicy::from_config(&config).unwrap();
        assert_eq!(policy.expiration, Duration::seconds(60));
        assert_eq!(policy.leeway, Duration::seconds(5));
        assert_eq!(policy.issuer, "http://academy.devdojo");
    }

    #[test]
    fn test_policy_rejects_bad_values() {
        assert!(TokenPolicy::new("", Duration::seconds(60)).is_err());
        assert!(TokenPolicy::new("issuer", Duration::zero()).is_err());
        assert!(TokenPolicy::new("issuer", Duration::milliseconds(500)).is_err());
        assert!(TokenPolicy::new("issuer", Duration::milliseconds(1500)).is_err());

        let config = JwtConfig {
            expiration: u64::MAX,
            ..JwtConfig::default()
        };
        assert!(TokenPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_segment_count_is_checked() {
        let engine = engine(clock());
        for token in ["", "abc", "a.b", "a..c", "a.b.c.d"] {
            assert!(matches!(
                engine.verify(token),
                Err(TokenError::MalformedToken(_))
            ));
        }
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(inspect_token_unverified("not-a-token").is_err());
        assert!(inspect_token_unverified("a.b.c").is_err());
    }
}
