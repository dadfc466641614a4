//! Argon2id password verifiers.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    Hash,

    #[error("stored password verifier is malformed")]
    MalformedVerifier,
}

/// Hash a password into a PHC string with a fresh salt.
///
/// Argon2id with the library's default cost parameters; the cost is embedded
/// in the verifier so parameters can be raised without invalidating existing
/// hashes.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored PHC verifier.
pub fn verify_password(password: &str, verifier: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(verifier).map_err(|_| PasswordError::MalformedVerifier)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let verifier = hash_password("p4ssword-ok").expect("hashing succeeds");

        assert!(verifier.starts_with("$argon2id$"));
        assert!(verify_password("p4ssword-ok", &verifier).expect("verify runs"));
        assert!(!verify_password("wrong", &verifier).expect("verify runs"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password").expect("hashing succeeds");
        let b = hash_password("same-password").expect("hashing succeeds");

        assert_ne!(a, b);
    }

    #[test]
    fn malformed_verifier_is_an_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(PasswordError::MalformedVerifier)
        ));
    }
}
