use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

// Argon2id cost. Roughly on par with bcrypt at cost 14 on commodity hardware.
const MEMORY_COST_KIB: u32 = 64 * 1024;
const TIME_COST: u32 = 3;
const PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
}

/// CredentialManager
///
/// Hashes and verifies account passwords with Argon2id. The plaintext only ever lives
/// on the stack of these two calls; it is neither stored nor logged.
///
/// Both operations are CPU-heavy and run inline on the calling request.
#[derive(Debug, Clone, Copy)]
pub struct CredentialManager {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self {
            memory_kib: MEMORY_COST_KIB,
            iterations: TIME_COST,
            parallelism: PARALLELISM,
        }
    }
}

impl CredentialManager {
    /// Builds a manager with an explicit cost. Production code uses `default()`; tests
    /// use a small cost to stay fast.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>, CredentialError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| CredentialError::HashingFailed(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// hash
    ///
    /// Produces a salted PHC string (`$argon2id$...`) embedding its own parameters.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// verify
    ///
    /// Checks `password` against a stored hash using the parameters recorded in the
    /// hash itself. A mismatch or an unparseable hash is simply `false`.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("stored password hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
