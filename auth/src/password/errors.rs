use thiserror::Error;

/// Error type for password operations.
///
/// Verification never fails; only hashing can, and only when the salt source or
/// the hasher itself breaks down.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}
