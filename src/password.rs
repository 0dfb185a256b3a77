//! Password hashing via bcrypt.
//!
//! bcrypt is CPU-bound, so both operations run on the blocking thread pool.

use std::fmt;

pub use bcrypt::DEFAULT_COST;

#[derive(Debug)]
pub enum PasswordError {
    Bcrypt(bcrypt::BcryptError),
    Join(tokio::task::JoinError),
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordError::Bcrypt(e) => write!(f, "bcrypt: {}", e),
            PasswordError::Join(e) => write!(f, "hashing task failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Hash a password with the given bcrypt cost.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(PasswordError::Join)?
        .map_err(PasswordError::Bcrypt)
}

/// Verify a password against a bcrypt hash.
///
/// A malformed stored hash is an error, not a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(PasswordError::Join)?
        .map_err(PasswordError::Bcrypt)
}
