//! Signing key management.
//!
//! One RSA key pair is loaded (or generated) at startup and placed in a
//! [`KeyRing`]. The ring is immutable afterwards: issuance always signs with
//! its active key and verification looks public keys up by `kid` in the same
//! ring. Key material carried inside a token is never trusted.

use crate::error::TokenError;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use gatekey_core::config::{KeysConfig, MIN_RSA_BITS};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::sha2::{Digest, Sha256};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Supplies fresh signing key pairs.
pub trait KeyProvider: Send + Sync {
    /// Generate a new, cryptographically random key pair.
    fn generate_key_pair(&self) -> Result<SigningKeyPair, TokenError>;
}

/// Generates RSA key pairs from the operating system's random source.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyProvider {
    bits: usize,
}

impl RsaKeyProvider {
    /// Create a provider for `bits`-sized keys. Anything below 2048 bits is
    /// refused.
    pub fn new(bits: usize) -> Result<Self, TokenError> {
        if bits < MIN_RSA_BITS {
            return Err(TokenError::KeyGeneration(format!(
                "RSA keys must be at least {MIN_RSA_BITS} bits, got {bits}"
            )));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> usize {
        self.bits
    }
}

impl Default for RsaKeyProvider {
    fn default() -> Self {
        Self { bits: MIN_RSA_BITS }
    }
}

impl KeyProvider for RsaKeyProvider {
    fn generate_key_pair(&self) -> Result<SigningKeyPair, TokenError> {
        tracing::info!(bits = self.bits, "Generating RSA {} bits keys", self.bits);
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, self.bits)
            .map_err(|e| TokenError::KeyGeneration(e.to_string()))?;
        SigningKeyPair::from_private_key(private_key).map_err(|e| match e {
            TokenError::InvalidKey(msg) => TokenError::KeyGeneration(msg),
            other => other,
        })
    }
}

/// The verification half of a key pair.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    decoding_key: DecodingKey,
    jwk: Jwk,
}

impl VerificationKey {
    /// Load a public key from PEM (SubjectPublicKeyInfo or PKCS#1).
    pub fn from_public_pem(pem: &str) -> Result<Self, TokenError> {
        let pem = pem.trim();
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| TokenError::InvalidKey(format!("not an RSA public key: {e}")))?;
        verification_key_for(&public_key)
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("decoding_key", &"<DecodingKey>")
            .finish()
    }
}

/// An RSA key pair used to sign tokens.
///
/// The key id is the RFC 7638 thumbprint of the public key, so a key loaded
/// from disk keeps the same id across restarts.
#[derive(Clone)]
pub struct SigningKeyPair {
    private_key: RsaPrivateKey,
    encoding_key: EncodingKey,
    public: VerificationKey,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.public.kid)
            .field("bits", &self.bits())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl SigningKeyPair {
    /// Wrap an existing RSA private key.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, TokenError> {
        let bits = private_key.size() * 8;
        if bits < MIN_RSA_BITS {
            return Err(TokenError::InvalidKey(format!(
                "RSA key is {bits} bits, at least {MIN_RSA_BITS} required"
            )));
        }

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        let public = verification_key_for(&private_key.to_public_key())?;

        Ok(Self {
            private_key,
            encoding_key,
            public,
        })
    }

    /// Load a key pair from a PEM private key (PKCS#8 or PKCS#1).
    pub fn from_private_pem(pem: &str) -> Result<Self, TokenError> {
        let pem = pem.trim();
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| TokenError::InvalidKey(format!("not an RSA private key: {e}")))?;
        Self::from_private_key(private_key)
    }

    /// Load a key pair from a PEM private key file.
    pub fn load_from_file(path: &Path) -> Result<Self, TokenError> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_private_pem(&pem)
    }

    pub fn kid(&self) -> &str {
        &self.public.kid
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.private_key.size() * 8
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn verification_key(&self) -> &VerificationKey {
        &self.public
    }

    /// The private key as PKCS#8 PEM.
    pub fn private_key_pem(&self) -> Result<String, TokenError> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))
    }

    /// The public key as SubjectPublicKeyInfo PEM.
    pub fn public_key_pem(&self) -> Result<String, TokenError> {
        self.private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))
    }

    /// Save the key pair to PEM files.
    pub fn save_to_files(
        &self,
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> Result<(), TokenError> {
        std::fs::write(private_key_path, self.private_key_pem()?)?;
        std::fs::write(public_key_path, self.public_key_pem()?)?;
        Ok(())
    }
}

fn verification_key_for(public_key: &RsaPublicKey) -> Result<VerificationKey, TokenError> {
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    let kid = rsa_thumbprint(&n, &e);

    let decoding_key = DecodingKey::from_rsa_components(&n, &e)
        .map_err(|err| TokenError::InvalidKey(err.to_string()))?;

    let jwk = Jwk {
        kty: "RSA".to_string(),
        kid: kid.clone(),
        use_: "sig".to_string(),
        alg: "RS256".to_string(),
        n,
        e,
    };

    Ok(VerificationKey {
        kid,
        decoding_key,
        jwk,
    })
}

/// RFC 7638 thumbprint: SHA-256 over the canonical `{"e","kty","n"}` JSON.
fn rsa_thumbprint(n: &str, e: &str) -> String {
    // Members in lexicographic order, no whitespace.
    let canonical = format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#);
    let hash = Sha256::digest(canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Resolves the verification key for a token's `kid`.
pub trait KeyResolver: Send + Sync {
    fn resolve(&self, kid: &str) -> Option<&DecodingKey>;
}

/// Process-wide key table: one active signing key plus every public key that
/// tokens may still reference.
#[derive(Clone)]
pub struct KeyRing {
    active: SigningKeyPair,
    verification: HashMap<String, VerificationKey>,
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("active", &self.active.kid())
            .field("keys", &self.key_ids())
            .finish()
    }
}

impl KeyRing {
    /// Create a ring whose only key is `active`.
    pub fn new(active: SigningKeyPair) -> Self {
        let mut verification = HashMap::new();
        verification.insert(active.kid().to_string(), active.public.clone());
        Self {
            active,
            verification,
        }
    }

    /// Startup initialization: load the configured private key, or generate
    /// an ephemeral one through `provider` when none is configured.
    ///
    /// A configured key file that is missing or unreadable fails with
    /// [`TokenError::Io`]; no key is generated in its place.
    pub fn load_or_generate(
        config: &KeysConfig,
        provider: &dyn KeyProvider,
    ) -> Result<Self, TokenError> {
        match config.resolve_private_key()? {
            Some(pem) => {
                let pair = SigningKeyPair::from_private_pem(&pem)?;
                tracing::info!(kid = %pair.kid(), bits = pair.bits(), "Loaded signing key");
                Ok(Self::new(pair))
            }
            None => {
                tracing::warn!(
                    "No signing key configured, generating an ephemeral key; issued tokens will not survive a restart"
                );
                let pair = provider.generate_key_pair()?;
                tracing::info!(kid = %pair.kid(), "Generated signing key");
                Ok(Self::new(pair))
            }
        }
    }

    /// Build a new ring that signs with `next` and still verifies tokens
    /// signed by every key of this ring.
    pub fn rotate(&self, next: SigningKeyPair) -> Self {
        let mut verification = self.verification.clone();
        verification.insert(next.kid().to_string(), next.public.clone());
        tracing::info!(previous = %self.active.kid(), next = %next.kid(), "Rotated signing key");
        Self {
            active: next,
            verification,
        }
    }

    pub fn active(&self) -> &SigningKeyPair {
        &self.active
    }

    /// All known key ids, sorted.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.verification.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Public keys as a JWK set, active key first.
    pub fn jwks(&self) -> Jwks {
        let mut keys = vec![self.active.public.jwk.clone()];
        keys.extend(
            self.key_ids()
                .into_iter()
                .filter(|kid| *kid != self.active.kid())
                .filter_map(|kid| self.verification.get(kid))
                .map(|key| key.jwk.clone()),
        );
        Jwks { keys }
    }
}

impl KeyResolver for KeyRing {
    fn resolve(&self, kid: &str) -> Option<&DecodingKey> {
        self.verification.get(kid).map(|key| &key.decoding_key)
    }
}

impl KeyResolver for VerificationKey {
    fn resolve(&self, kid: &str) -> Option<&DecodingKey> {
        (self.kid == kid).then_some(&self.decoding_key)
    }
}

/// JSON Web Key Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// RSA public JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "RSA".
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig").
    #[serde(rename = "use")]
    pub use_: String,

    pub alg: String,

    /// Modulus (base64url).
    pub n: String,

    /// Exponent (base64url).
    pub e: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use std::sync::OnceLock;
    use tempfile::tempdir;

    fn shared_key() -> &'static SigningKeyPair {
        static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
        KEY.get_or_init(|| RsaKeyProvider::default().generate_key_pair().unwrap())
    }

    #[test]
    fn test_keypair_generation() {
        let keypair = shared_key();
        assert_eq!(keypair.bits(), 2048);
        assert!(!keypair.kid().is_empty());
        assert!(keypair.private_key_pem().unwrap().contains("BEGIN PRIVATE KEY"));
        assert!(keypair.public_key_pem().unwrap().contains("BEGIN PUBLIC KEY"));
    }

    #[test]
    fn test_provider_rejects_small_keys() {
        assert!(matches!(
            RsaKeyProvider::new(1024),
            Err(TokenError::KeyGeneration(_))
        ));
        assert_eq!(RsaKeyProvider::new(3072).unwrap().bits(), 3072);
    }

    #[test]
    fn test_pkcs8_roundtrip_keeps_kid() {
        let keypair = shared_key();
        let pem = keypair.private_key_pem().unwrap();

        let loaded = SigningKeyPair::from_private_pem(&pem).unwrap();
        assert_eq!(loaded.kid(), keypair.kid());
    }

    #[test]
    fn test_pkcs1_pem_is_accepted() {
        let keypair = shared_key();
        let pkcs1 = keypair
            .private_key
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap()
            .to_string();

        let loaded = SigningKeyPair::from_private_pem(&pkcs1).unwrap();
        assert_eq!(loaded.kid(), keypair.kid());
    }

    #[test]
    fn test_garbage_pem_is_rejected() {
        let err = SigningKeyPair::from_private_pem("not a key").unwrap_err();
        assert!(matches!(err, TokenError::InvalidKey(_)));
    }

    #[test]
    fn test_keypair_file_save_load() {
        let dir = tempdir().unwrap();
        let private_path = dir.path().join("private.pem");
        let public_path = dir.path().join("public.pem");

        let keypair = shared_key();
        keypair.save_to_files(&private_path, &public_path).unwrap();

        let loaded = SigningKeyPair::load_from_file(&private_path).unwrap();
        assert_eq!(loaded.kid(), keypair.kid());
        assert!(std::fs::read_to_string(&public_path)
            .unwrap()
            .starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_thumbprint_matches_rfc7638_example() {
        // RFC 7638 section 3.1
        let n = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";
        let e = "AQAB";
        assert_eq!(
            rsa_thumbprint(n, e),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn test_public_pem_resolves_same_kid() {
        let keypair = shared_key();
        let public = VerificationKey::from_public_pem(&keypair.public_key_pem().unwrap()).unwrap();

        assert_eq!(public.kid(), keypair.kid());
        assert_eq!(public.jwk(), keypair.verification_key().jwk());
        assert!(public.resolve(keypair.kid()).is_some());
        assert!(public.resolve("other").is_none());

        assert!(VerificationKey::from_public_pem("-----BEGIN PUBLIC KEY-----").is_err());
    }

    #[test]
    fn test_ring_resolves_only_known_keys() {
        let ring = KeyRing::new(shared_key().clone());
        assert!(ring.resolve(shared_key().kid()).is_some());
        assert!(ring.resolve("unknown-kid").is_none());
        assert_eq!(ring.key_ids(), vec![shared_key().kid()]);
    }

    #[test]
    fn test_jwks_export() {
        let ring = KeyRing::new(shared_key().clone());
        let jwks = ring.jwks();
        assert_eq!(jwks.keys.len(), 1);

        let jwk = &jwks.keys[0];
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.use_, "sig");
        assert_eq!(jwk.kid, shared_key().kid());
        assert_eq!(jwk.e, "AQAB");

        let json = serde_json::to_value(&jwks).unwrap();
        assert_eq!(json["keys"][0]["use"], "sig");
    }

    #[test]
    fn test_load_or_generate_prefers_configured_key() {
        let dir = tempdir().unwrap();
        let private_path = dir.path().join("private.pem");
        std::fs::write(&private_path, shared_key().private_key_pem().unwrap()).unwrap();

        let config = KeysConfig {
            private_key_env: None,
            private_key_file: Some(private_path),
            bits: 2048,
        };

        struct NeverGenerate;
        impl KeyProvider for NeverGenerate {
            fn generate_key_pair(&self) -> Result<SigningKeyPair, TokenError> {
                Err(TokenError::KeyGeneration("must not be called".into()))
            }
        }

        let ring = KeyRing::load_or_generate(&config, &NeverGenerate).unwrap();
        assert_eq!(ring.active().kid(), shared_key().kid());
    }

    #[test]
    fn test_load_or_generate_fails_on_missing_key_file() {
        let dir = tempdir().unwrap();
        let config = KeysConfig {
            private_key_env: None,
            private_key_file: Some(dir.path().join("typo.pem")),
            bits: 2048,
        };

        struct Fixed(SigningKeyPair);
        impl KeyProvider for Fixed {
            fn generate_key_pair(&self) -> Result<SigningKeyPair, TokenError> {
                Ok(self.0.clone())
            }
        }

        let err = KeyRing::load_or_generate(&config, &Fixed(shared_key().clone())).unwrap_err();
        match err {
            TokenError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_load_or_generate_falls_back_to_provider() {
        let config = KeysConfig {
            private_key_env: None,
            private_key_file: None,
            bits: 2048,
        };

        struct Fixed(SigningKeyPair);
        impl KeyProvider for Fixed {
            fn generate_key_pair(&self) -> Result<SigningKeyPair, TokenError> {
                Ok(self.0.clone())
            }
        }

        let ring = KeyRing::load_or_generate(&config, &Fixed(shared_key().clone())).unwrap();
        assert_eq!(ring.active().kid(), shared_key().kid());
    }

    #[test]
    fn test_load_or_generate_propagates_provider_failure() {
        let config = KeysConfig {
            private_key_env: None,
            private_key_file: None,
            bits: 2048,
        };

        struct Broken;
        impl KeyProvider for Broken {
            fn generate_key_pair(&self) -> Result<SigningKeyPair, TokenError> {
                Err(TokenError::KeyGeneration("no entropy".into()))
            }
        }

        let err = KeyRing::load_or_generate(&config, &Broken).unwrap_err();
        assert!(matches!(err, TokenError::KeyGeneration(_)));
    }
}
