use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::AppError;

pub const MIN_PASSWORD_CHARS: usize = 8;

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AppError::internal(anyhow::anyhow!(e.to_string()))
        })
}

/// `Ok(false)` on mismatch. A stored hash that does not parse is an
/// internal error, never a credential failure.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        AppError::internal(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn malformed_hash_is_internal() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
