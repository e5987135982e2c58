use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Fixed session lifetime. Not configurable.
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Identity fields carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl ToString, email: impl ToString, username: impl ToString) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
        }
    }
}

/// Claim set encoded into a session token.
///
/// `iat` and `exp` are Unix timestamps in seconds. Every field is required:
/// a token whose payload lacks one of them does not decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Create claims for an identity, expiring one session lifetime after `issued_at`.
    ///
    /// # Arguments
    /// * `identity` - Identity fields to carry
    /// * `issued_at` - Issuance instant
    ///
    /// # Returns
    /// Claims with `exp - iat` equal to exactly 24 hours
    pub fn for_identity(identity: Identity, issued_at: DateTime<Utc>) -> Self {
        let expires_at = issued_at + Duration::hours(SESSION_LIFETIME_HOURS);

        Self {
            user_id: identity.user_id,
            email: identity.email,
            username: identity.username,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }

    /// Check if the session has expired. A token is still valid at exactly `exp`.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        current_timestamp > self.exp
    }
}

/// Claims recovered from a token that passed algorithm, signature and expiry checks.
///
/// Only [`TokenService::validate`](super::TokenService::validate) constructs this
/// type, so holding one proves the claims came from a valid token. Refresh takes
/// it by reference and never accepts raw claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaims(Claims);

impl ValidatedClaims {
    pub(crate) fn new(claims: Claims) -> Self {
        Self(claims)
    }

    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }

    pub fn issued_at(&self) -> i64 {
        self.0.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.0.exp
    }

    pub fn identity(&self) -> Identity {
        self.0.identity()
    }

    pub fn claims(&self) -> &Claims {
        &self.0
    }
}
