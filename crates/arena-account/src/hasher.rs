//! Password hashing.
//!
//! Only salted hashes are ever stored. [`CredentialHasher`] is the seam;
//! [`Argon2Hasher`] is the production implementation.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

use crate::AccountError;

/// Hashes passwords and checks them against stored hashes.
///
/// Both methods are CPU-bound and synchronous; async callers should run
/// them on the blocking pool.
pub trait CredentialHasher: Send + Sync + 'static {
    /// Produces a self-describing hash string for `password`.
    ///
    /// # Errors
    /// [`AccountError::Hash`] if hashing fails.
    fn hash(&self, password: &str) -> Result<String, AccountError>;

    /// Returns `true` if `password` matches `hash`. A malformed hash
    /// never matches.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with a random 16-byte salt, producing PHC strings.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Uses the `argon2` crate's recommended parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit cost parameters: memory in KiB, iterations, lanes.
    ///
    /// # Errors
    /// [`AccountError::Hash`] if the parameters are out of range.
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, AccountError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AccountError::Hash(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AccountError> {
        let salt_bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AccountError::Hash(e.to_string()))?;
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccountError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
