//! Password hashing and temporary-credential generation.
//!
//! Hashes are PHC strings (argon2id). The plaintext of a generated temporary
//! password exists exactly once, inside [`TemporaryPassword`], and is handed
//! to the notification path for one-time delivery.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

/// Length of generated temporary passwords.
const TEMP_PASSWORD_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// A freshly generated one-time password.
///
/// Deliberately opaque: no `Display`, no serde. Call sites must use
/// [`TemporaryPassword::expose`] to get at the plaintext, which keeps the
/// handoff points greppable.
pub struct TemporaryPassword(String);

impl TemporaryPassword {
    pub fn generate() -> Self {
        let plain: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMP_PASSWORD_LEN)
            .map(char::from)
            .collect();
        Self(plain)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for TemporaryPassword {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TemporaryPassword(..)")
    }
}

/// Hash a plaintext password into a PHC string.
pub fn hash_password(plain: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC string.
pub fn verify_password(plain: &str, phc: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(phc).map_err(|e| CredentialError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2hunter2", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn generated_passwords_have_expected_shape() {
        let a = TemporaryPassword::generate();
        let b = TemporaryPassword::generate();
        assert_eq!(a.expose().len(), TEMP_PASSWORD_LEN);
        assert!(a.expose().chars().all(|c| c.is_ascii_alphanumeric()));
        // Two draws colliding would mean the generator is broken.
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(CredentialError::MalformedHash(_))
        ));
    }
}
