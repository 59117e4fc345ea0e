//! Password hashing primitives used by the password identifier.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("bcrypt cost {0} is outside the supported range 4..=31")]
    InvalidCost(u32),

    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Hashes and verifies stored passwords.
pub trait PasswordHasher: Send + Sync + 'static {
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Hash with an explicit work factor instead of the configured one.
    fn hash_with_cost(&self, plaintext: &str, cost: u32) -> Result<String, HashError>;

    /// Verify `plaintext` against `hash`. Malformed hashes never verify.
    fn check(&self, plaintext: &str, hash: &str) -> bool;

    /// Whether `hash` was produced with parameters weaker than the current
    /// ones and should be replaced after a successful check.
    fn needs_rehash(&self, hash: &str) -> bool;
}

/// bcrypt-backed [`PasswordHasher`].
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if !(4..=31).contains(&cost) {
            return Err(HashError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Cost factor encoded in a modular-crypt bcrypt hash (`$2b$12$...`).
    fn hash_cost(hash: &str) -> Option<u32> {
        let mut parts = hash.split('$');
        // leading empty segment, then version, then cost
        parts.next().filter(|s| s.is_empty())?;
        parts.next()?;
        parts.next()?.parse().ok()
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    fn hash_with_cost(&self, plaintext: &str, cost: u32) -> Result<String, HashError> {
        Ok(bcrypt::hash(plaintext, Self::new(cost)?.cost)?)
    }

    fn check(&self, plaintext: &str, hash: &str) -> bool {
        match bcrypt::verify(plaintext, hash) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "Stored hash could not be verified");
                false
            }
        }
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        !hash.starts_with("$2b$") || Self::hash_cost(hash) != Some(self.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_then_check() {
        let hasher = BcryptHasher::new(TEST_COST).unwrap();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hasher.check("correct horse", &hash));
        assert!(!hasher.check("battery staple", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hasher = BcryptHasher::new(TEST_COST).unwrap();
        assert!(!hasher.check("anything", ""));
        assert!(!hasher.check("anything", "not-a-hash"));
    }

    #[test]
    fn rehash_needed_when_cost_changes() {
        let weak = BcryptHasher::new(TEST_COST).unwrap();
        let strong = BcryptHasher::new(TEST_COST + 1).unwrap();
        let hash = weak.hash("pw").unwrap();

        assert!(!weak.needs_rehash(&hash));
        assert!(strong.needs_rehash(&hash));
        assert!(strong.needs_rehash("$2y$05$legacyprefixlegacyprefixlegacyprefixlegacyprefixleg"));
    }

    #[test]
    fn cost_is_parsed_from_hash() {
        assert_eq!(BcryptHasher::hash_cost("$2b$12$abc"), Some(12));
        assert_eq!(BcryptHasher::hash_cost("2b$12$abc"), None);
        assert_eq!(BcryptHasher::hash_cost("$2b$xx$abc"), None);
    }

    #[test]
    fn explicit_cost_overrides_configured_cost() {
        let hasher = BcryptHasher::new(TEST_COST).unwrap();
        let hash = hasher.hash_with_cost("pw", TEST_COST + 1).unwrap();

        assert_eq!(BcryptHasher::hash_cost(&hash), Some(TEST_COST + 1));
        assert!(hasher.check("pw", &hash));
        assert!(matches!(
            hasher.hash_with_cost("pw", 2),
            Err(HashError::InvalidCost(2))
        ));
    }

    #[test]
    fn cost_out_of_range_is_rejected() {
        assert!(matches!(BcryptHasher::new(3), Err(HashError::InvalidCost(3))));
        assert!(matches!(BcryptHasher::new(32), Err(HashError::InvalidCost(32))));
    }
}
