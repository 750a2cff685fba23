use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher as Argon2PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Argon2;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Error type for password operations.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password verification failed: {0}")]
    VerificationFailed(String),
}

/// One-way credential hasher.
///
/// Argon2id with a fresh random salt per hash; verification is constant-time
/// inside the algorithm. Plaintext never leaves this module through logs or
/// return values.
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a plaintext password for storage.
    ///
    /// # Returns
    /// PHC string (algorithm, parameters, salt, and digest in one value)
    ///
    /// # Errors
    /// * `HashingFailed` - the underlying hash operation failed
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Check a plaintext password against a stored PHC string.
    ///
    /// # Errors
    /// * `VerificationFailed` - the stored hash could not be parsed
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| PasswordError::VerificationFailed(format!("invalid hash: {e}")))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";

/// Generate a temporary password: 8-12 characters with at least one
/// lowercase, one uppercase, one digit and one symbol.
///
/// Callers hash the result immediately; the plain value is only ever
/// delivered out-of-band (onboarding email) and never persisted.
pub fn generate_temporary() -> String {
    let mut rng = rand::thread_rng();
    let length = rng.gen_range(8..=12);

    let mut chars: Vec<u8> = vec![
        LOWER[rng.gen_range(0..LOWER.len())],
        UPPER[rng.gen_range(0..UPPER.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
        SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
    ];

    let pool: Vec<u8> = [LOWER, UPPER, DIGITS, SYMBOLS].concat();
    while chars.len() < length {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    // The first four positions are one per class; shuffle so position leaks
    // nothing about character class.
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}
