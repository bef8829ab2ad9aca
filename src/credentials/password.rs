//! Argon2id password hashing.
//!
//! Stored values are PHC strings (`$argon2id$v=19$m=...`) carrying their own
//! salt and parameters, so verification needs nothing but the stored string.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::AuthError;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check `password` against a stored PHC string.
///
/// # Errors
/// Returns [`AuthError::Hashing`] when the stored value is not a valid PHC
/// string; a wrong password is `Ok(false)`.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn hash_is_phc_and_salted() -> Result<()> {
        let first = hash_password("pw1")?;
        let second = hash_password("pw1")?;
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(!first.contains("pw1"));
        Ok(())
    }

    #[test]
    fn verify_accepts_only_the_original_password() -> Result<()> {
        let hash = hash_password("correct horse")?;
        assert!(verify_password("correct horse", &hash)?);
        assert!(!verify_password("correct horse ", &hash)?);
        assert!(!verify_password("", &hash)?);
        Ok(())
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("pw", "plaintext-password"),
            Err(AuthError::Hashing(_))
        ));
    }
}
