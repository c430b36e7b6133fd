//! Password hashing utilities

use bcrypt::{hash, verify, DEFAULT_COST};

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Verify a password against a bcrypt hash. A malformed hash counts as a
/// mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password_only() {
        let hashed = bcrypt::hash("billiard-night", 4).unwrap();
        assert!(verify_password("billiard-night", &hashed));
        assert!(!verify_password("billiard-day", &hashed));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
