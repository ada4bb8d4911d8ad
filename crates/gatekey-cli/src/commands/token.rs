//! Token management commands.
//!
//! `gatekey token issue` - Issue a token for a user.
//! `gatekey token verify` - Verify a token is valid.
//! `gatekey token inspect` - Inspect a token's contents without verifying it.

use crate::commands::load_config;
use anyhow::Context;
use chrono::{DateTime, Utc};
use gatekey_token::{
    Claims, Identity, KeyRing, SigningKeyPair, TokenEngine, TokenPolicy, TokenVerifier,
    VerificationKey, inspect_token_unverified,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve a private key from either a file path or PEM text.
///
/// The key string can be:
/// - A path to a PEM file
/// - PEM text directly (e.g., from the GATEKEY_PRIVATE_KEY env var)
fn resolve_private_key(key: Option<String>) -> anyhow::Result<SigningKeyPair> {
    let key_str = key.context(
        "Private key not provided. Either pass --key <path> or set GATEKEY_PRIVATE_KEY env var",
    )?;

    let path = Path::new(&key_str);
    if path.exists() {
        return SigningKeyPair::load_from_file(path)
            .with_context(|| format!("Failed to load private key from file: {}", path.display()));
    }

    SigningKeyPair::from_private_pem(&key_str)
        .context("Failed to parse private key. Expected a PEM-encoded RSA private key")
}

/// Resolve a verification key from a public or private key, given as a path
/// or as PEM text.
fn resolve_verification_key(key: Option<String>) -> anyhow::Result<VerificationKey> {
    let key_str = key.context(
        "Key not provided. Either pass --key <path> or set GATEKEY_PUBLIC_KEY env var",
    )?;

    let path = Path::new(&key_str);
    let pem = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?
    } else {
        key_str
    };

    if pem.contains("PRIVATE KEY") {
        let keypair = SigningKeyPair::from_private_pem(&pem)
            .context("Failed to parse RSA private key")?;
        return Ok(keypair.verification_key().clone());
    }

    VerificationKey::from_public_pem(&pem)
        .context("Failed to parse key. Expected a PEM-encoded RSA public key")
}

/// Load a token from a file if the argument names one.
fn read_token(token: String) -> anyhow::Result<String> {
    if Path::new(&token).exists() {
        Ok(fs::read_to_string(&token)?.trim().to_string())
    } else {
        Ok(token.trim().to_string())
    }
}

/// Issue a token for `user` with the given authorities.
pub fn issue(
    private_key: Option<String>,
    user: String,
    authorities: Vec<String>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let cfg = load_config(config.as_deref())?;
    let keypair = resolve_private_key(private_key)?;
    let engine = TokenEngine::new(KeyRing::new(keypair), TokenPolicy::from_config(&cfg.jwt)?);

    let token = engine.issue(&Identity::new(user, authorities))?;
    let claims = token.claims();

    if let Some(output_path) = output {
        fs::write(&output_path, token.as_str())?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  Subject: {}", claims.subject);
        println!("  Authorities: {}", claims.authorities.join(", "));
        println!("  Issuer: {}", claims.issuer);
        if let Some(expires) = claims.expires_at_time() {
            println!("  Expires: {}", expires.to_rfc3339());
        }
    } else {
        println!("{}", token);
    }

    Ok(())
}

/// Verify a token is valid.
pub fn verify(key: Option<String>, token: String, config: Option<PathBuf>) -> anyhow::Result<()> {
    let claims = verify_claims(key, token, config)?;

    println!("✔ Token is valid");
    println!();
    println!("Token Details:");
    println!("  Subject: {}", claims.subject);
    if claims.authorities.is_empty() {
        println!("  Authorities: (none)");
    } else {
        println!("  Authorities: {}", claims.authorities.join(", "));
    }
    println!("  Issuer: {}", claims.issuer);
    if let Some(issued) = claims.issued_at_time() {
        println!("  Issued: {}", issued.to_rfc3339());
    }
    if let Some(expires) = claims.expires_at_time() {
        println!("  Expires: {}", expires.to_rfc3339());
    }
    println!(
        "  Remaining: {}s",
        claims.remaining_lifetime(Utc::now()).num_seconds()
    );

    Ok(())
}

fn verify_claims(
    key: Option<String>,
    token: String,
    config: Option<PathBuf>,
) -> anyhow::Result<Claims> {
    let cfg = load_config(config.as_deref())?;
    let key = resolve_verification_key(key)?;
    let token = read_token(token)?;

    let verifier = TokenVerifier::new(TokenPolicy::from_config(&cfg.jwt)?);
    verifier
        .verify(&token, &key)
        .context("✖ Token verification failed")
}

/// Inspect a token without verification.
pub fn inspect(token: String) -> anyhow::Result<()> {
    let token = read_token(token)?;
    let info = inspect_token_unverified(&token)?;

    println!("Token Information (signature NOT verified):");
    println!();
    println!("Header:");
    println!("{}", serde_json::to_string_pretty(&info.header)?);
    println!();
    println!("Claims:");
    println!("{}", serde_json::to_string_pretty(&info.claims)?);

    if let Some(status) = expiry_status(info.expires_at(), Utc::now()) {
        println!();
        println!("{status}");
    }

    Ok(())
}

/// Human-readable expiry line for an unverified `exp` claim.
fn expiry_status(expires_at: Option<i64>, now: DateTime<Utc>) -> Option<String> {
    let expires = DateTime::from_timestamp(expires_at?, 0)?;
    let state = if now >= expires { "expired" } else { "not yet expired" };
    Some(format!("Expires: {} ({state})", expires.to_rfc3339()))
}
