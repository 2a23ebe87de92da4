/// Password policy and off-thread hashing
///
/// Argon2 is deliberately slow, so hashing and verification are moved onto the
/// blocking pool and never run on the async worker threads.
use crypto_core::{Credential, HashParams};
use zxcvbn::zxcvbn;

use crate::error::{AuthError, AuthResult};

/// Upper bound on accepted password length (characters)
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Minimum credential strength, externally configurable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// How many of {uppercase, lowercase, digit, symbol} must appear
    pub min_char_classes: u8,
    /// Optional zxcvbn score floor (0-4)
    pub min_score: Option<u8>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_char_classes: 3,
            min_score: None,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password
    ///
    /// Fails with `WeakCredential` naming the first rule that is not met.
    pub fn check(&self, password: &str) -> AuthResult<()> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(AuthError::WeakCredential(format!(
                "must be at least {} characters",
                self.min_length
            )));
        }
        if length > MAX_PASSWORD_LENGTH {
            return Err(AuthError::WeakCredential(format!(
                "must be at most {} characters",
                MAX_PASSWORD_LENGTH
            )));
        }

        let classes = [
            password.chars().any(|c| c.is_uppercase()),
            password.chars().any(|c| c.is_lowercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_alphanumeric()),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        if classes < usize::from(self.min_char_classes) {
            return Err(AuthError::WeakCredential(format!(
                "must mix at least {} of: uppercase, lowercase, digits, symbols",
                self.min_char_classes
            )));
        }

        if let Some(min_score) = self.min_score {
            let entropy = zxcvbn(password, &[]).map_err(|e| {
                AuthError::Internal(format!("Password entropy calculation failed: {}", e))
            })?;
            if entropy.score() < min_score {
                return Err(AuthError::WeakCredential(
                    "is too easy to guess".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Hash on the blocking pool
pub async fn hash_blocking(password: String, params: HashParams) -> AuthResult<Credential> {
    tokio::task::spawn_blocking(move || crypto_core::hash_password(&password, &params))
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(AuthError::from)
}

/// Verify on the blocking pool
pub async fn verify_blocking(password: String, credential: Credential) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || crypto_core::verify_password(&password, &credential))
        .await
        .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))?
        .map_err(AuthError::from)
}
