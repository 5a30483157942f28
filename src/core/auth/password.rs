//! Password hashing
//!
//! bcrypt with a per-hash random salt. Verification goes through bcrypt's own
//! constant-time digest comparison.

use std::sync::Arc;

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Hashing task failed: {0}")]
    Task(String),
}

/// One-way adaptive password hashing
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Returns `Ok(false)` on mismatch; errors only for unusable digests
    fn verify(&self, password: &str, digest: &str) -> Result<bool, HashError>;
}

#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        bcrypt::hash(password, self.cost).map_err(|e| HashError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, digest: &str) -> Result<bool, HashError> {
        bcrypt::verify(password, digest).map_err(|_| HashError::MalformedHash)
    }
}

/// Hash on the blocking pool; bcrypt at production cost takes hundreds of ms
pub async fn hash_blocking(
    hasher: &Arc<dyn PasswordHasher>,
    password: &str,
) -> Result<String, HashError> {
    let hasher = Arc::clone(hasher);
    let password = password.to_string();

    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| HashError::Task(e.to_string()))?
}

pub async fn verify_blocking(
    hasher: &Arc<dyn PasswordHasher>,
    password: &str,
    digest: &str,
) -> Result<bool, HashError> {
    let hasher = Arc::clone(hasher);
    let password = password.to_string();
    let digest = digest.to_string();

    tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
        .await
        .map_err(|e| HashError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the suite fast
    fn hasher() -> BcryptHasher {
        BcryptHasher::new(4)
    }

    #[test]
    fn test_default_cost() {
        assert_eq!(BcryptHasher::default().cost(), 12);
    }

    #[test]
    fn test_hash_produces_bcrypt_digest() {
        let hash = hasher().hash("Secret1!").unwrap();

        assert!(hash.starts_with("$2b$") || hash.starts_with("$2a$") || hash.starts_with("$2y$"));
        assert_eq!(hash.len(), 60);
        assert!(!hash.contains("Secret1!"));
    }

    #[test]
    fn test_hash_is_salted() {
        let hash1 = hasher().hash("same_password").unwrap();
        let hash2 = hasher().hash("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hash = hasher().hash("correct_password").unwrap();

        assert!(hasher().verify("correct_password", &hash).unwrap());
        assert!(!hasher().verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_unicode() {
        let password = "пароль_密码_🔐";
        let hash = hasher().hash(password).unwrap();
        assert!(hasher().verify(password, &hash).unwrap());
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(hasher());

        let hash = hash_blocking(&hasher, "Secret1!").await.unwrap();
        assert!(verify_blocking(&hasher, "Secret1!", &hash).await.unwrap());
        assert!(!verify_blocking(&hasher, "secret1!", &hash).await.unwrap());
    }

    #[test]
    fn test_verify_malformed_digest() {
        let result = hasher().verify("password", "not_a_valid_hash");
        assert!(matches!(result, Err(HashError::MalformedHash)));
    }
}
