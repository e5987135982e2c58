use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::ExternalId;
use crate::domain::user::models::ExternalLoginCommand;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::user::errors::StoreError;
use crate::user::errors::UserError;

/// Port for identity resolution operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new password-authenticated user.
    ///
    /// # Arguments
    /// * `command` - Validated email, username and password
    ///
    /// # Returns
    /// Created user entity
    ///
    /// # Errors
    /// * `DuplicateEmail` - Email is already registered (checked first)
    /// * `DuplicateUsername` - Username is already taken
    /// * `Hashing` - Password hashing failed
    /// * `StoreUnavailable` - Store operation failed or timed out
    async fn register_local(&self, command: RegisterCommand) -> Result<User, UserError>;

    /// Verify an email/password pair.
    ///
    /// # Returns
    /// Matching user entity
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password (indistinguishable)
    /// * `StoreUnavailable` - Store operation failed or timed out
    async fn verify_local_credentials(&self, email: &str, password: &str)
        -> Result<User, UserError>;

    /// Return the user linked to an external identity, creating it on first login.
    ///
    /// # Arguments
    /// * `command` - External ID, optional provider email, username (or fallback)
    ///
    /// # Returns
    /// Existing or newly created user entity
    ///
    /// # Errors
    /// * `DuplicateEmail` - A different user already owns the email
    /// * `DuplicateUsername` - A different user already owns the username
    /// * `StoreUnavailable` - Store operation failed or timed out
    async fn resolve_external_identity(
        &self,
        command: ExternalLoginCommand,
    ) -> Result<User, UserError>;

    /// Retrieve user by unique identifier.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `StoreUnavailable` - Store operation failed or timed out
    async fn get_user(&self, id: &UserId) -> Result<User, UserError>;

    /// Apply a partial profile update.
    ///
    /// # Arguments
    /// * `id` - User ID to update
    /// * `command` - Optional email, username, avatar URL and preferences to merge
    ///
    /// # Returns
    /// Updated user entity
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DuplicateEmail` - New email belongs to another user
    /// * `DuplicateUsername` - New username belongs to another user
    /// * `StoreUnavailable` - Store operation failed or timed out
    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError>;

    /// Permanently delete a user.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `StoreUnavailable` - Store operation failed or timed out
    async fn delete_user(&self, id: &UserId) -> Result<(), UserError>;
}

/// Persistence operations for user records.
///
/// Lookups return `Ok(None)` when nothing matches; `Err` is reserved for store
/// failures. Implementations must enforce uniqueness of email, username and
/// external ID themselves and report violations as `StoreError::Conflict`.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Errors
    /// * `Conflict` - A unique key is already taken
    /// * `Unavailable` - Store operation failed
    async fn create(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError>;

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<User>, StoreError>;

    /// Overwrite an existing user record.
    ///
    /// # Returns
    /// Updated user entity, or `None` if no record has this ID
    ///
    /// # Errors
    /// * `Conflict` - New email or username is already taken
    /// * `Unavailable` - Store operation failed
    async fn update(&self, user: User) -> Result<Option<User>, StoreError>;

    /// Remove user from storage.
    ///
    /// # Returns
    /// Whether a record was removed
    async fn delete(&self, id: &UserId) -> Result<bool, StoreError>;

    async fn email_exists(&self, email: &EmailAddress) -> Result<bool, StoreError>;

    async fn username_exists(&self, username: &Username) -> Result<bool, StoreError>;
}

/// Password hashing as used by the identity resolver.
pub trait CredentialHasher: Send + Sync + 'static {
    /// Hash a plaintext password for storage.
    fn hash(&self, password: &str) -> Result<String, auth::PasswordError>;

    /// Check a password against a stored hash.
    ///
    /// Must cost a full verification even when `stored_hash` is `None`, and
    /// must return false in that case.
    fn verify_stored(&self, password: &str, stored_hash: Option<&str>) -> bool;
}

impl CredentialHasher for auth::PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, auth::PasswordError> {
        auth::PasswordHasher::hash(self, password)
    }

    fn verify_stored(&self, password: &str, stored_hash: Option<&str>) -> bool {
        auth::PasswordHasher::verify_stored(self, password, stored_hash)
    }
}
