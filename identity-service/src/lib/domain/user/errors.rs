use std::fmt;

use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error(
        "Username contains invalid characters (only alphanumeric, underscore, hyphen and dot allowed)"
    )]
    InvalidCharacters,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for password policy violations on new passwords
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },
}

/// Error for ExternalId validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalIdError {
    #[error("External identity is empty")]
    Empty,

    #[error("External identity too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Directory keys that must be unique across all users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    Email,
    Username,
    ExternalId,
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueKey::Email => f.write_str("email"),
            UniqueKey::Username => f.write_str("username"),
            UniqueKey::ExternalId => f.write_str("external_id"),
        }
    }
}

/// Raw failures surfaced by a credential store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The storage layer rejected a write that would break a unique key.
    #[error("Unique constraint violated on {0}")]
    Conflict(UniqueKey),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out")]
    Timeout,
}

/// Top-level error for all identity operations
#[derive(Debug, Clone, Error)]
pub enum UserError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordPolicyError),

    #[error("Invalid external identity: {0}")]
    InvalidExternalId(#[from] ExternalIdError),

    // Domain-level errors
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("External identity already linked")]
    DuplicateExternalId,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // Infrastructure errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl UserError {
    /// Whether the error describes a malformed input shape.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UserError::InvalidUserId(_)
                | UserError::InvalidUsername(_)
                | UserError::InvalidEmail(_)
                | UserError::InvalidPassword(_)
                | UserError::InvalidExternalId(_)
        )
    }
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(UniqueKey::Email) => UserError::DuplicateEmail,
            StoreError::Conflict(UniqueKey::Username) => UserError::DuplicateUsername,
            StoreError::Conflict(UniqueKey::ExternalId) => UserError::DuplicateExternalId,
            StoreError::Unavailable(_) | StoreError::Timeout => {
                UserError::StoreUnavailable(err.to_string())
            }
        }
    }
}
