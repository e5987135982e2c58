use thiserror::Error;

/// Error type for session token operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    /// Token could not be decoded, is missing claims, or asserts a signing
    /// algorithm other than the pinned one.
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token is expired")]
    Expired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    /// The signer is misconfigured (e.g. empty secret).
    #[error("Failed to sign token: {0}")]
    SigningFailed(String),
}
