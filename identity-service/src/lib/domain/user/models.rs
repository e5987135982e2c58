use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use uuid::Uuid;

use crate::user::errors::EmailError;
use crate::user::errors::ExternalIdError;
use crate::user::errors::PasswordPolicyError;
use crate::user::errors::UserIdError;
use crate::user::errors::UsernameError;

/// User aggregate entity.
///
/// Every user can authenticate somehow: `password_hash`, `external_id`, or both
/// are set. `password_hash`, `external_id` and `external_email` never leave the
/// service.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub username: Username,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub preferences: Preferences,
    pub external_id: Option<ExternalId>,
    pub external_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a new password-authenticated user with empty preferences.
    pub fn new_local(email: EmailAddress, username: Username, password_hash: String) -> Self {
        Self {
            id: UserId::new(),
            email,
            username,
            password_hash: Some(password_hash),
            avatar_url: None,
            preferences: Preferences::new(),
            external_id: None,
            external_email: None,
            created_at: Utc::now(),
        }
    }

    /// Build a new user linked to an external identity, with no password.
    pub fn new_external(
        external_id: ExternalId,
        email: EmailAddress,
        external_email: Option<String>,
        username: Username,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            username,
            password_hash: None,
            avatar_url: None,
            preferences: Preferences::new(),
            external_id: Some(external_id),
            external_email,
            created_at: Utc::now(),
        }
    }

    /// Identity fields to carry in a session token.
    pub fn identity(&self) -> auth::Identity {
        auth::Identity::new(self.id, self.email.as_str(), self.username.as_str())
    }
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Username value type
///
/// Ensures username is 3-30 characters of alphanumerics, underscore, hyphen and dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    const MIN_LENGTH: usize = 3;
    const MAX_LENGTH: usize = 30;
    const FALLBACK_PREFIX: &'static str = "user_";
    const FALLBACK_ID_CHARS: usize = 8;

    /// Create a new valid username.
    ///
    /// # Errors
    /// * `TooShort` - Username shorter than 3 characters
    /// * `TooLong` - Username longer than 30 characters
    /// * `InvalidCharacters` - Contains characters other than alphanumerics, `_`, `-`, `.`
    pub fn new(username: String) -> Result<Self, UsernameError> {
        let username = Self::with_valid_length(username)?;
        let username = Self::with_valid_chars(username)?;
        Ok(Self(username))
    }

    /// Derive the default username for an external identity that supplied none.
    ///
    /// Deterministic: `user_` followed by the first 8 usable characters of the
    /// external ID.
    pub fn fallback_for(external_id: &ExternalId) -> Self {
        let suffix: String = external_id
            .as_str()
            .chars()
            .filter(|c| Self::is_allowed_char(*c))
            .take(Self::FALLBACK_ID_CHARS)
            .collect();

        Self(format!("{}{}", Self::FALLBACK_PREFIX, suffix))
    }

    fn with_valid_length(username: String) -> Result<String, UsernameError> {
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(username)
        }
    }

    fn with_valid_chars(username: String) -> Result<String, UsernameError> {
        if username.chars().all(Self::is_allowed_char) {
            Ok(username)
        } else {
            Err(UsernameError::InvalidCharacters)
        }
    }

    fn is_allowed_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    const PLACEHOLDER_PREFIX: &'static str = "ext-";
    const PLACEHOLDER_DIGEST_BYTES: usize = 20;
    const PLACEHOLDER_DOMAIN: &'static str = "external.invalid";

    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Directory email for an external identity that did not share one.
    ///
    /// The local part is a truncated SHA-256 hex digest of the external ID, so it
    /// is always a valid address whatever characters the provider uses, and two
    /// distinct IDs never share it in practice. The reserved `.invalid` TLD means
    /// it can never receive mail.
    pub fn placeholder_for(external_id: &ExternalId) -> Self {
        let digest = Sha256::digest(external_id.as_str().as_bytes());
        let local = hex::encode(&digest[..Self::PLACEHOLDER_DIGEST_BYTES]);

        Self(format!(
            "{}{}@{}",
            Self::PLACEHOLDER_PREFIX,
            local,
            Self::PLACEHOLDER_DOMAIN
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subject identifier asserted by an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalId(String);

impl ExternalId {
    const MAX_LENGTH: usize = 255;

    /// # Errors
    /// * `Empty` - Blank identifier
    /// * `TooLong` - Longer than 255 characters
    pub fn new(external_id: String) -> Result<Self, ExternalIdError> {
        let external_id = external_id.trim().to_string();
        let length = external_id.chars().count();

        if length == 0 {
            Err(ExternalIdError::Empty)
        } else if length > Self::MAX_LENGTH {
            Err(ExternalIdError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(Self(external_id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A new password in plaintext, checked against the password policy.
///
/// Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 8;

    /// # Errors
    /// * `TooShort` - Fewer than 8 characters
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        let length = password.chars().count();
        if length < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            });
        }
        Ok(Self(password))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Open string-keyed user preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(Map<String, Value>);

impl Preferences {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Merge `updates` key by key: new keys are added, existing keys overwritten,
    /// keys absent from `updates` are kept.
    pub fn merge(&mut self, updates: Preferences) {
        for (key, value) in updates.0 {
            self.0.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Preferences {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Command to register a password-authenticated user
#[derive(Debug)]
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub username: Username,
    pub password: Password,
}

impl RegisterCommand {
    pub fn new(email: EmailAddress, username: Username, password: Password) -> Self {
        Self {
            email,
            username,
            password,
        }
    }
}

/// Command to log in (or sign up) through a pre-verified external identity.
#[derive(Debug)]
pub struct ExternalLoginCommand {
    pub external_id: ExternalId,
    pub email: Option<EmailAddress>,
    pub username: Username,
}

impl ExternalLoginCommand {
    /// Construct the command, deriving a username when none was provided.
    ///
    /// # Arguments
    /// * `external_id` - Provider subject identifier
    /// * `email` - Provider-supplied email, if shared
    /// * `username` - Requested username, if any
    pub fn new(external_id: ExternalId, email: Option<EmailAddress>, username: Option<Username>) -> Self {
        let username = username.unwrap_or_else(|| Username::fallback_for(&external_id));
        Self {
            external_id,
            email,
            username,
        }
    }
}

/// Command to update a profile with optional validated fields.
///
/// Only provided fields are applied. Preferences are merged, not replaced.
#[derive(Debug, Default)]
pub struct UpdateProfileCommand {
    pub email: Option<EmailAddress>,
    pub username: Option<Username>,
    pub avatar_url: Option<String>,
    pub preferences: Option<Preferences>,
}
