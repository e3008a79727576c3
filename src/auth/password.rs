/// Password Hashing and Verification
///
/// bcrypt with a per-call random salt. Both operations are CPU-bound and run
/// on the blocking thread pool.

use std::sync::Arc;

use bcrypt::{hash, verify};
use tokio::sync::OnceCell;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash at the same cost, verified against when the account does not
    /// exist so an unknown email costs the same as a wrong password
    dummy_hash: Arc<OnceCell<String>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Hash a password using bcrypt
    ///
    /// # Errors
    /// Returns error if bcrypt fails or the blocking task is lost
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    ///
    /// Fails closed: a malformed hash or a lost task counts as a mismatch.
    pub async fn verify(&self, password: &str, password_hash: &str) -> bool {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        match tokio::task::spawn_blocking(move || verify(password, &password_hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Password verification failed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }

    /// Burn roughly one verification's worth of work and return `false`
    pub async fn verify_dummy(&self, password: &str) -> bool {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash("timing-equaliser-password"))
            .await;
        if let Ok(dummy) = dummy {
            let _ = self.verify(password, dummy).await;
        }
        false
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[tokio::test]
    async fn test_hash_password() {
        let password = "ValidPassword123!";
        let hash = hasher().hash(password).await.expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let a = hasher().hash("ValidPassword123!").await.unwrap();
        let b = hasher().hash("ValidPassword123!").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_verify_password() {
        let hash = hasher().hash("ValidPassword123!").await.unwrap();
        assert!(hasher().verify("ValidPassword123!", &hash).await);
    }

    #[tokio::test]
    async fn test_verify_wrong_password() {
        let hash = hasher().hash("ValidPassword123!").await.unwrap();
        assert!(!hasher().verify("WrongPassword123!", &hash).await);
    }

    #[tokio::test]
    async fn test_malformed_hash_fails_closed() {
        assert!(!hasher().verify("ValidPassword123!", "not-a-bcrypt-hash").await);
        assert!(!hasher().verify("ValidPassword123!", "").await);
    }

    #[tokio::test]
    async fn test_dummy_never_matches() {
        assert!(!hasher().verify_dummy("timing-equaliser-password").await);
    }
}
