use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

use crate::config::HashingConfig;

/// Newtype for password to prevent accidental logging
#[derive(Debug, Clone)]
pub struct Password(Secret<String>);

impl Password {
    pub fn new(password: String) -> Self {
        Self(Secret::new(password))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid hashing parameters: {0}")]
    Params(String),

    #[error("Failed to hash password: {0}")]
    Hashing(String),
}

/// Argon2id password hashing with configurable cost.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    dummy_hash: PasswordHashString,
}

impl CredentialHasher {
    pub fn new(config: &HashingConfig) -> Result<Self, CredentialError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| CredentialError::Params(e.to_string()))?;

        let mut hasher = Self {
            params,
            dummy_hash: PasswordHashString::new(String::new()),
        };
        // Verified against when the account does not exist, so both login
        // failure paths pay for one Argon2 run.
        hasher.dummy_hash = hasher.hash(&Password::new("timing-equalization-only".to_string()))?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt. The PHC output embeds the
    /// algorithm, cost and salt.
    pub fn hash(&self, password: &Password) -> Result<PasswordHashString, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2()
            .hash_password(password.expose().as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    /// Constant-time check of `password` against a stored PHC string.
    /// A malformed stored hash counts as a mismatch.
    pub fn verify(&self, password: &Password, password_hash: &PasswordHashString) -> bool {
        let parsed_hash = match PasswordHash::new(password_hash.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        self.argon2()
            .verify_password(password.expose().as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Burn one verification for an unknown account.
    pub fn verify_dummy(&self, password: &Password) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}
