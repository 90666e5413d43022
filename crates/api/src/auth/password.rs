//! Argon2id password hashing
//!
//! Hashing and verification are CPU-bound and run on the blocking pool.

use std::sync::Arc;

use argon2::password_hash::{
    self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use mercado_shared::StoredHash;
use rand::RngCore;

const SALT_LEN: usize = 16;

/// Plaintext hashed once at startup; unknown sign-in identifiers are
/// verified against it so they cost the same as a real check.
const DUMMY_PASSWORD: &str = "mercado-dummy-password";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
    #[error("password worker failed: {0}")]
    Worker(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Settings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl Argon2Settings {
    fn params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|err| PasswordError::InvalidParams(err.to_string()))
    }
}

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    /// Validate `settings` and pre-compute the dummy hash.
    pub fn new(settings: Argon2Settings) -> Result<Self, PasswordError> {
        let params = settings.params()?;
        let dummy_hash = hash_blocking(&params, DUMMY_PASSWORD)?;
        Ok(Self {
            params,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<StoredHash, PasswordError> {
        let params = self.params.clone();
        let password = password.to_owned();
        let phc = tokio::task::spawn_blocking(move || hash_blocking(&params, &password))
            .await
            .map_err(|err| PasswordError::Worker(err.to_string()))??;
        Ok(StoredHash::new(phc))
    }

    /// `Ok(false)` on mismatch; `MalformedHash` when the stored value is not
    /// a PHC string.
    pub async fn verify(&self, stored: &StoredHash, candidate: &str) -> Result<bool, PasswordError> {
        let stored = stored.as_str().to_owned();
        let candidate = candidate.to_owned();
        tokio::task::spawn_blocking(move || verify_blocking(&stored, &candidate))
            .await
            .map_err(|err| PasswordError::Worker(err.to_string()))?
    }

    /// Spend one verification's worth of time, discarding the result.
    pub async fn verify_dummy(&self, candidate: &str) {
        let stored = self.dummy_hash.clone();
        let candidate = candidate.to_owned();
        let result =
            tokio::task::spawn_blocking(move || verify_blocking(&stored, &candidate)).await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "dummy password verification did not complete");
        }
    }
}

fn argon2(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn hash_blocking(params: &Params, password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt =
        SaltString::encode_b64(&salt).map_err(|err| PasswordError::Hash(err.to_string()))?;
    argon2(params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

fn verify_blocking(stored: &str, candidate: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
    // Cost parameters come from the PHC string itself
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordError::Hash(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::cheap_argon2 as cheap;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = PasswordHasher::new(cheap()).unwrap();
        let stored = hasher.hash("s3cret!").await.unwrap();

        assert!(stored.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify(&stored, "s3cret!").await.unwrap());
        assert!(!hasher.verify(&stored, "s3cret?").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_password_gets_distinct_salts() {
        let hasher = PasswordHasher::new(cheap()).unwrap();
        let a = hasher.hash("repeat").await.unwrap();
        let b = hasher.hash("repeat").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_an_error() {
        let hasher = PasswordHasher::new(cheap()).unwrap();
        let result = hasher
            .verify(&StoredHash::new("not-a-phc-string"), "anything")
            .await;
        assert!(matches!(result, Err(PasswordError::MalformedHash)));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let settings = Argon2Settings {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordHasher::new(settings),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_default_settings_match_argon2_defaults() {
        let settings = Argon2Settings::default();
        assert_eq!(settings.memory_kib, 19 * 1024);
        assert_eq!(settings.iterations, 2);
        assert_eq!(settings.parallelism, 1);
    }
}
