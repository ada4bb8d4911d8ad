//! # gatekey-token
//!
//! RS256 JSON Web Token handling for gatekey.
//!
//! This crate provides functionality for:
//! - Generating and loading RSA signing keys
//! - Issuing signed tokens for authenticated identities
//! - Verifying tokens and extracting their claims
//! - Publishing public keys as a JWK set
//!
//! ## Key model
//!
//! | Piece | Lifetime | Role |
//! |-------|----------|------|
//! | **Signing key** | Process (or file-backed) | Signs every issued token |
//! | **Key ring** | Process | Maps `kid` to public keys for verification |
//! | **Token** | `jwt.expiration` seconds | Carries `sub`, `authorities`, `iss`, `iat`, `exp` |
//!
//! Tokens name their key with a `kid` header. Verification resolves that id
//! in the local key ring only.

pub mod claims;
pub mod clock;
pub mod error;
pub mod keys;
pub mod token;

pub use claims::{Claims, Identity};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::TokenError;
pub use keys::{
    Jwk, Jwks, KeyProvider, KeyResolver, KeyRing, RsaKeyProvider, SigningKeyPair, VerificationKey,
};
pub use token::{
    ALGORITHM, SignedToken, TokenEngine, TokenInfo, TokenPolicy, TokenVerifier,
    inspect_token_unverified,
};
