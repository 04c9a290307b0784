//! One-way password hashing with Argon2id.
//!
//! Hashing and verification are CPU-heavy; the async wrappers move them onto the
//! blocking pool so they never stall the runtime.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;
use tokio::task;

use crate::config::SecurityConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Stored credential is corrupt: {0}")]
    CorruptCredential(String),
}

/// Argon2id hasher configured from `[security]`.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| PasswordError::Hashing(format!("invalid Argon2 params: {e}")))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Compare a password against a stored PHC string.
    ///
    /// The cost parameters are read from the stored hash, so hashes produced
    /// under older `[security]` settings keep verifying. A mismatch is
    /// `Ok(false)`; an unparseable hash is [`PasswordError::CorruptCredential`].
    pub fn verify(stored_hash: &str, password: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| PasswordError::CorruptCredential(e.to_string()))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::CorruptCredential(e.to_string())),
        }
    }

    pub async fn hash_blocking(&self, password: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::Hashing(format!("hashing task failed: {e}")))?
    }

    pub async fn verify_blocking(
        stored_hash: String,
        password: String,
    ) -> Result<bool, PasswordError> {
        task::spawn_blocking(move || Self::verify(&stored_hash, &password))
            .await
            .map_err(|e| PasswordError::Hashing(format!("verification task failed: {e}")))?
    }
}

/// Random alphanumeric password for accounts that must never log in by password
/// until one is explicitly set.
#[must_use]
pub fn generate_random_password(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
