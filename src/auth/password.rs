//! Password hashing for stored credentials
//!
//! Argon2id with the crate defaults, stored as PHC strings. Passwords reach
//! this module only after they have been opened from a sealed field.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::{Result, TurnstileError};

/// Hash a password, returning a PHC string with salt and parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TurnstileError::Internal(format!("Failed to hash password: {e}")))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| TurnstileError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Spend the same effort as a real verification when there is no account.
///
/// Keeps "unknown email" and "wrong password" indistinguishable by timing.
pub fn verify_against_dummy(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();

    let dummy = DUMMY.get_or_init(|| hash_password("turnstile-dummy-credential").ok());
    if let Some(stored) = dummy {
        let _ = verify_password(password, stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Abc123!@").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password("Abc123!@", &hash).unwrap());
        assert!(!verify_password("Abc123!#", &hash).unwrap());
    }

    #[test]
    fn test_salted() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_corrupt_hash_is_error() {
        assert!(verify_password("password", "not-a-valid-hash").is_err());
    }

    #[test]
    fn test_dummy_verify_does_not_panic() {
        verify_against_dummy("anything");
        verify_against_dummy("");
    }
}
