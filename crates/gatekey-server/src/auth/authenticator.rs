use crate::error::AuthError;
use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use gatekey_core::UserEntry;
use gatekey_token::Identity;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Argon2id hash with the default cost parameters, checked for unknown
/// usernames so they take as long to reject as wrong passwords. No password
/// matches it.
const UNKNOWN_USER_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$Z2F0ZWtleS11bmtub3duLXVzZXI$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

/// Username/password pair submitted on login.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Checks credentials and returns the authenticated identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError>;
}

/// Credential store backed by the `users:` section of the configuration.
///
/// Passwords are stored as Argon2 PHC strings.
pub struct StaticUserAuthenticator {
    users: HashMap<String, UserEntry>,
}

impl StaticUserAuthenticator {
    /// Build the store, rejecting entries whose hash is not a PHC string.
    pub fn from_entries(entries: &[UserEntry]) -> Result<Self, AuthError> {
        let mut users = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.username.trim().is_empty() {
                return Err(AuthError::Internal("user entry with empty username".into()));
            }
            PasswordHash::new(&entry.password_hash).map_err(|e| {
                AuthError::Internal(format!("invalid password hash for {}: {e}", entry.username))
            })?;
            if users.insert(entry.username.clone(), entry.clone()).is_some() {
                return Err(AuthError::Internal(format!(
                    "duplicate user entry {}",
                    entry.username
                )));
            }
        }

        if users.is_empty() {
            tracing::warn!("No users configured; every login attempt will fail");
        }
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticUserAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let user = self.users.get(&credentials.username);
        let hash = user.map_or(UNKNOWN_USER_HASH, |u| u.password_hash.as_str()).to_string();
        let password = credentials.password.clone();
        // Argon2 verification is CPU-bound.
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))??;

        match user {
            Some(user) if verified => {
                Ok(Identity::new(user.username.clone(), user.authorities.clone()))
            }
            Some(_) => {
                tracing::debug!(username = %credentials.username, "Password mismatch");
                Err(AuthError::BadCredentials)
            }
            None => {
                tracing::debug!(username = %credentials.username, "Unknown user");
                Err(AuthError::BadCredentials)
            }
        }
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash a password into an Argon2 PHC string for the `users:` section.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}
