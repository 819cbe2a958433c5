/// Password Hashing and Verification
///
/// Salted one-way hashing with bcrypt. The digest is self-describing
/// (`$2b$<cost>$<salt><hash>`), so verification needs no extra parameters.

use crate::error::{AppError, ConfigError};

/// Default work factor, the bcrypt crate's recommended cost (12)
pub const DEFAULT_PASSWORD_HASH_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    /// # Errors
    /// Returns `InvalidValue` if the cost is outside what bcrypt accepts
    pub fn new(cost: u32) -> Result<Self, ConfigError> {
        if !(4..=31).contains(&cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password hash cost {} out of range",
                cost
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Fails only when bcrypt itself fails (e.g. the salt source is
    /// unavailable); input shape is never rejected here.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Constant-time comparison of `password` against `digest`.
    ///
    /// A malformed digest counts as a mismatch.
    pub fn verify(&self, digest: &str, password: &str) -> bool {
        match bcrypt::verify(password, digest) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password digest could not be parsed");
                false
            }
        }
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_PASSWORD_HASH_COST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(4).expect("cost 4 is valid")
    }

    #[test]
    fn test_hash_password() {
        let password = "pass1234";
        let hash = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hasher = hasher();
        let hash = hasher.hash("pass1234").expect("Failed to hash password");

        assert!(hasher.verify(&hash, "pass1234"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = hasher();
        let hash = hasher.hash("pass1234").expect("Failed to hash password");

        assert!(!hasher.verify(&hash, "pass1235"));
        assert!(!hasher.verify(&hash, ""));
    }

    #[test]
    fn test_same_password_different_salts() {
        let hasher = hasher();
        let first = hasher.hash("pass1234").unwrap();
        let second = hasher.hash("pass1234").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify(&first, "pass1234"));
        assert!(hasher.verify(&second, "pass1234"));
    }

    #[test]
    fn test_malformed_digest_is_mismatch() {
        let hasher = hasher();

        assert!(!hasher.verify("", "pass1234"));
        assert!(!hasher.verify("not-a-bcrypt-hash", "pass1234"));
        assert!(!hasher.verify("$2b$04$tooshort", "pass1234"));
    }

    #[test]
    fn test_digest_from_other_cost_still_verifies() {
        let strong = CredentialHasher::new(5).unwrap();
        let hash = strong.hash("pass1234").unwrap();

        assert!(hasher().verify(&hash, "pass1234"));
    }

    #[test]
    fn test_cost_out_of_range() {
        assert!(CredentialHasher::new(3).is_err());
        assert!(CredentialHasher::new(32).is_err());
        assert_eq!(CredentialHasher::default().cost(), DEFAULT_PASSWORD_HASH_COST);
    }
}
