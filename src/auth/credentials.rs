//! In-memory account store with PBKDF2 password hashing.
//!
//! Accounts live in a [`RecordStore`] keyed by username. Passwords are hashed
//! with PBKDF2-HMAC-SHA256 over a random per-account salt and stored as PHC
//! strings (`$pbkdf2-sha256$i=...,l=32$<salt>$<hash>`), so the round count
//! travels with each hash.

use crate::store::{InMemoryStore, RecordStore};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

/// Default PBKDF2 rounds for password stretching.
pub const DEFAULT_HASH_ROUNDS: u32 = 100_000;

/// Maximum username length in bytes.
const MAX_USERNAME_LEN: usize = 64;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Derived key length in bytes.
const HASH_OUTPUT_LEN: usize = 32;

/// A registered user.
#[derive(Clone)]
pub struct Account {
    pub username: String,
    /// PHC-format PBKDF2 hash. Never the plaintext.
    pub password_hash: String,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("invalid password: {0}")]
    InvalidPassword(String),
    #[error("username is already taken")]
    AlreadyExists,
    /// Unknown user or wrong password; deliberately indistinguishable.
    #[error("invalid username or password")]
    AuthFailed,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Username → account map plus the hashing policy.
pub struct CredentialStore {
    accounts: Arc<dyn RecordStore<Account>>,
    hash_rounds: u32,
    /// Hash checked against when the username is unknown, so a miss costs
    /// the same as a wrong password.
    dummy_hash: String,
}

impl CredentialStore {
    pub fn new(
        accounts: Arc<dyn RecordStore<Account>>,
        hash_rounds: u32,
    ) -> Result<Self, CredentialError> {
        let dummy_hash = hash_password("filegate-dummy-password", hash_rounds)?;
        Ok(Self {
            accounts,
            hash_rounds,
            dummy_hash,
        })
    }

    pub fn in_memory(hash_rounds: u32) -> Result<Self, CredentialError> {
        Self::new(Arc::new(InMemoryStore::new()), hash_rounds)
    }

    /// Register a new account. Existing usernames are rejected, never overwritten.
    ///
    /// Blocks for the duration of the hash; call from `spawn_blocking` in async code.
    pub fn register(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(CredentialError::InvalidPassword(
                "password cannot be empty".into(),
            ));
        }
        // Cheap pre-check so a taken name doesn't pay for a hash.
        if self.accounts.get(&username).is_some() {
            return Err(CredentialError::AlreadyExists);
        }

        let password_hash = hash_password(password, self.hash_rounds)?;
        let account = Account {
            username: username.clone(),
            password_hash,
        };
        if !self.accounts.insert_new(username.clone(), account) {
            return Err(CredentialError::AlreadyExists);
        }
        tracing::info!(username = %username, "Account registered");
        Ok(())
    }

    /// Check a username/password pair, returning the canonical username.
    pub fn verify(&self, username: &str, password: &str) -> Result<String, CredentialError> {
        match self.accounts.get(username.trim()) {
            Some(account) => {
                if verify_password(password, &account.password_hash) {
                    Ok(account.username)
                } else {
                    Err(CredentialError::AuthFailed)
                }
            }
            None => {
                let _ = verify_password(password, &self.dummy_hash);
                Err(CredentialError::AuthFailed)
            }
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.accounts.get(username.trim()).is_some()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    #[cfg(test)]
    fn account(&self, username: &str) -> Option<Account> {
        self.accounts.get(username)
    }
}

fn validate_username(username: &str) -> Result<String, CredentialError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(CredentialError::InvalidUsername(
            "username cannot be empty".into(),
        ));
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(CredentialError::InvalidUsername(format!(
            "username too long (max {MAX_USERNAME_LEN} characters)"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CredentialError::InvalidUsername(
            "username contains control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

// ── Cryptographic Helpers ───────────────────────────────────────────

fn hash_password(password: &str, rounds: u32) -> Result<String, CredentialError> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| CredentialError::Hashing(e.to_string()))?;

    let params = Params {
        rounds,
        output_length: HASH_OUTPUT_LEN,
    };
    let hash = Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Constant-time check of `password` against a stored PHC string.
fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
}
