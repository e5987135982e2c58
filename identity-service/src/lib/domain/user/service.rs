use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::ExternalLoginCommand;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::user::errors::StoreError;
use crate::user::errors::UniqueKey;
use crate::user::errors::UserError;
use crate::user::ports::CredentialHasher;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Identity resolver over an injected credential store.
///
/// Uniqueness is pre-checked for a friendly fast path, but the store's own
/// conflict report is what decides: a `Conflict` on write is translated into the
/// matching duplicate error.
pub struct UserService<UR, CH = auth::PasswordHasher>
where
    UR: UserRepository,
    CH: CredentialHasher,
{
    repository: Arc<UR>,
    password_hasher: CH,
    store_timeout: Option<Duration>,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    /// Create a new user service with an injected repository.
    pub fn new(repository: Arc<UR>) -> Self {
        Self {
            repository,
            password_hasher: auth::PasswordHasher::new(),
            store_timeout: None,
        }
    }
}

impl<UR, CH> UserService<UR, CH>
where
    UR: UserRepository,
    CH: CredentialHasher,
{
    /// Replace the password hasher.
    pub fn with_password_hasher<H>(self, password_hasher: H) -> UserService<UR, H>
    where
        H: CredentialHasher,
    {
        UserService {
            repository: self.repository,
            password_hasher,
            store_timeout: self.store_timeout,
        }
    }

    /// Abort any single store call that takes longer than `timeout`.
    ///
    /// An elapsed deadline surfaces as `StoreUnavailable`.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    async fn store<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match self.store_timeout {
            Some(timeout) => tokio::time::timeout(timeout, operation)
                .await
                .map_err(|_| StoreError::Timeout)?,
            None => operation.await,
        }
    }

    async fn find_existing(&self, id: &UserId) -> Result<User, UserError> {
        self.store(self.repository.find_by_id(id))
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    async fn ensure_email_free(&self, email: &EmailAddress) -> Result<(), UserError> {
        if self.store(self.repository.email_exists(email)).await? {
            return Err(UserError::DuplicateEmail);
        }
        Ok(())
    }

    async fn ensure_username_free(&self, username: &Username) -> Result<(), UserError> {
        if self.store(self.repository.username_exists(username)).await? {
            return Err(UserError::DuplicateUsername);
        }
        Ok(())
    }
}

#[async_trait]
impl<UR, CH> UserServicePort for UserService<UR, CH>
where
    UR: UserRepository,
    CH: CredentialHasher,
{
    async fn register_local(&self, command: RegisterCommand) -> Result<User, UserError> {
        self.ensure_email_free(&command.email).await?;
        self.ensure_username_free(&command.username).await?;

        let password_hash = self
            .password_hasher
            .hash(command.password.as_str())
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing failed");
                UserError::Hashing(e.to_string())
            })?;

        let user = User::new_local(command.email, command.username, password_hash);
        let created_user = self.store(self.repository.create(user)).await?;

        tracing::info!(user_id = %created_user.id, "Local user registered");

        Ok(created_user)
    }

    async fn verify_local_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, UserError> {
        let user = match EmailAddress::new(email.to_string()) {
            Ok(email) => self.store(self.repository.find_by_email(&email)).await?,
            Err(_) => None,
        };

        // Every path pays for one hash verification, so timing does not reveal
        // whether the email is registered.
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.as_deref());
        let verified = self.password_hasher.verify_stored(password, stored_hash);

        match user {
            Some(user) if verified => Ok(user),
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Login attempt with wrong password");
                Err(UserError::InvalidCredentials)
            }
            None => {
                tracing::debug!("Login attempt for unknown email");
                Err(UserError::InvalidCredentials)
            }
        }
    }

    async fn resolve_external_identity(
        &self,
        command: ExternalLoginCommand,
    ) -> Result<User, UserError> {
        if let Some(user) = self
            .store(self.repository.find_by_external_id(&command.external_id))
            .await?
        {
            return Ok(user);
        }

        let external_email = command.email.as_ref().map(|e| e.as_str().to_string());
        let email = command
            .email
            .unwrap_or_else(|| EmailAddress::placeholder_for(&command.external_id));

        self.ensure_email_free(&email).await?;
        self.ensure_username_free(&command.username).await?;

        let user = User::new_external(
            command.external_id.clone(),
            email,
            external_email,
            command.username,
        );

        match self.store(self.repository.create(user)).await {
            Ok(created_user) => {
                tracing::info!(user_id = %created_user.id, "External identity user created");
                Ok(created_user)
            }
            // A concurrent first login linked this identity between our lookup and write.
            Err(StoreError::Conflict(UniqueKey::ExternalId)) => self
                .store(self.repository.find_by_external_id(&command.external_id))
                .await?
                .ok_or(UserError::DuplicateExternalId),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: &UserId) -> Result<User, UserError> {
        self.find_existing(id).await
    }

    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError> {
        let mut user = self.find_existing(id).await?;

        if let Some(new_email) = command.email {
            if new_email != user.email {
                self.ensure_email_free(&new_email).await?;
                user.email = new_email;
            }
        }

        if let Some(new_username) = command.username {
            if new_username != user.username {
                self.ensure_username_free(&new_username).await?;
                user.username = new_username;
            }
        }

        if let Some(avatar_url) = command.avatar_url {
            user.avatar_url = Some(avatar_url);
        }

        if let Some(preferences) = command.preferences {
            user.preferences.merge(preferences);
        }

        let updated_user = self
            .store(self.repository.update(user))
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        tracing::info!(user_id = %updated_user.id, "Profile updated");

        Ok(updated_user)
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), UserError> {
        self.find_existing(id).await?;

        if !self.store(self.repository.delete(id)).await? {
            return Err(UserError::NotFound(id.to_string()));
        }

        tracing::info!(user_id = %id, "User deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use chrono::Utc;
    use mockall::mock;
    use serde_json::json;

    use super::*;
    use crate::domain::user::models::ExternalId;
    use crate::domain::user::models::Password;
    use crate::domain::user::models::Preferences;
    use crate::outbound::repositories::memory::InMemoryUserRepository;

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, user: User) -> Result<User, StoreError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError>;
            async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError>;
            async fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<User>, StoreError>;
            async fn update(&self, user: User) -> Result<Option<User>, StoreError>;
            async fn delete(&self, id: &UserId) -> Result<bool, StoreError>;
            async fn email_exists(&self, email: &EmailAddress) -> Result<bool, StoreError>;
            async fn username_exists(&self, username: &Username) -> Result<bool, StoreError>;
        }
    }

    /// Store whose every call hangs forever.
    struct StalledRepository;

    #[async_trait]
    impl UserRepository for StalledRepository {
        async fn create(&self, _: User) -> Result<User, StoreError> {
            std::future::pending().await
        }
        async fn find_by_id(&self, _: &UserId) -> Result<Option<User>, StoreError> {
            std::future::pending().await
        }
        async fn find_by_email(&self, _: &EmailAddress) -> Result<Option<User>, StoreError> {
            std::future::pending().await
        }
        async fn find_by_username(&self, _: &Username) -> Result<Option<User>, StoreError> {
            std::future::pending().await
        }
        async fn find_by_external_id(&self, _: &ExternalId) -> Result<Option<User>, StoreError> {
            std::future::pending().await
        }
        async fn update(&self, _: User) -> Result<Option<User>, StoreError> {
            std::future::pending().await
        }
        async fn delete(&self, _: &UserId) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn email_exists(&self, _: &EmailAddress) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn username_exists(&self, _: &Username) -> Result<bool, StoreError> {
            std::future::pending().await
        }
    }

    /// Plain-text hasher that counts verifications.
    #[derive(Clone, Default)]
    struct CountingHasher {
        verifications: Arc<AtomicUsize>,
    }

    impl CountingHasher {
        fn verifications(&self) -> usize {
            self.verifications.load(Ordering::SeqCst)
        }
    }

    impl CredentialHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, auth::PasswordError> {
            Ok(format!("plain:{}", password))
        }

        fn verify_stored(&self, password: &str, stored_hash: Option<&str>) -> bool {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            stored_hash == Some(format!("plain:{}", password).as_str())
        }
    }

    fn email(s: &str) -> EmailAddress {
        EmailAddress::new(s.to_string()).unwrap()
    }

    fn username(s: &str) -> Username {
        Username::new(s.to_string()).unwrap()
    }

    fn register(e: &str, u: &str, p: &str) -> RegisterCommand {
        RegisterCommand::new(email(e), username(u), Password::new(p.to_string()).unwrap())
    }

    fn external(id: &str, e: Option<&str>, u: Option<&str>) -> ExternalLoginCommand {
        ExternalLoginCommand::new(
            ExternalId::new(id.to_string()).unwrap(),
            e.map(email),
            u.map(username),
        )
    }

    fn preferences(value: serde_json::Value) -> Preferences {
        serde_json::from_value(value).unwrap()
    }

    fn existing_user() -> User {
        User {
            id: UserId::new(),
            email: email("test@example.com"),
            username: username("testuser"),
            password_hash: Some("$argon2id$test_hash".to_string()),
            avatar_url: None,
            preferences: Preferences::new(),
            external_id: None,
            external_email: None,
            created_at: Utc::now(),
        }
    }

    fn in_memory() -> (Arc<InMemoryUserRepository>, UserService<InMemoryUserRepository>) {
        let repository = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(Arc::clone(&repository));
        (repository, service)
    }

    #[tokio::test]
    async fn test_register_local_success() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_username_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_create()
            .withf(|user| {
                user.username.as_str() == "testuser"
                    && user.email.as_str() == "test@example.com"
                    && user
                        .password_hash
                        .as_deref()
                        .is_some_and(|h| h.starts_with("$argon2"))
                    && user.preferences.is_empty()
                    && user.external_id.is_none()
            })
            .times(1)
            .returning(|user| Ok(user));

        let service = UserService::new(Arc::new(repository));

        let user = service
            .register_local(register("test@example.com", "testuser", "password123"))
            .await
            .expect("registration failed");

        assert_eq!(user.username.as_str(), "testuser");
        assert_eq!(user.email.as_str(), "test@example.com");
    }

    #[tokio::test]
    async fn test_register_local_checks_email_before_username() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Ok(true));
        repository.expect_username_exists().times(0);
        repository.expect_create().times(0);

        let service = UserService::new(Arc::new(repository));

        let result = service
            .register_local(register("test@example.com", "testuser", "password123"))
            .await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_register_local_duplicate_username() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_username_exists()
            .times(1)
            .returning(|_| Ok(true));
        repository.expect_create().times(0);

        let service = UserService::new(Arc::new(repository));

        let result = service
            .register_local(register("test@example.com", "testuser", "password123"))
            .await;
        assert!(matches!(result, Err(UserError::DuplicateUsername)));
    }

    #[tokio::test]
    async fn test_register_local_store_conflict_is_authoritative() {
        let mut repository = MockTestUserRepository::new();

        // Pre-check passes, but a concurrent registration wins the write.
        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_username_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_create()
            .times(1)
            .returning(|_| Err(StoreError::Conflict(UniqueKey::Email)));

        let service = UserService::new(Arc::new(repository));

        let result = service
            .register_local(register("test@example.com", "testuser", "password123"))
            .await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_register_local_store_failure() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection reset".to_string())));

        let service = UserService::new(Arc::new(repository));

        let result = service
            .register_local(register("test@example.com", "testuser", "password123"))
            .await;
        assert!(matches!(result, Err(UserError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_verify_local_credentials_unknown_email() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = UserService::new(Arc::new(repository));

        let result = service
            .verify_local_credentials("nobody@example.com", "password123")
            .await;
        assert!(matches!(result, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_local_credentials_malformed_email() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_find_by_email().times(0);

        let service = UserService::new(Arc::new(repository));

        let result = service
            .verify_local_credentials("not-an-email", "password123")
            .await;
        assert!(matches!(result, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_local_credentials_always_checks_password() {
        let mut repository = MockTestUserRepository::new();

        // Stored hash is not a valid digest for any password
        let user = existing_user();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = UserService::new(Arc::new(repository));

        let result = service
            .verify_local_credentials("test@example.com", "password123")
            .await;
        assert!(matches!(result, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_local_credentials_external_only_user() {
        let mut repository = MockTestUserRepository::new();

        let user = User {
            password_hash: None,
            external_id: Some(ExternalId::new("apple-sub".to_string()).unwrap()),
            ..existing_user()
        };
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = UserService::new(Arc::new(repository));

        let result = service
            .verify_local_credentials("test@example.com", "")
            .await;
        assert!(matches!(result, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_local_credentials_hashes_on_every_path() {
        let hasher = CountingHasher::default();
        let repository = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(Arc::clone(&repository)).with_password_hasher(hasher.clone());

        service
            .register_local(register("alice@example.com", "alice", "correct horse"))
            .await
            .unwrap();
        service
            .resolve_external_identity(external("apple-sub", Some("bob@icloud.com"), Some("bob")))
            .await
            .unwrap();
        assert_eq!(hasher.verifications(), 0);

        let attempts = [
            ("nobody@example.com", "correct horse"),
            ("not-an-email", "correct horse"),
            ("bob@icloud.com", ""),
            ("alice@example.com", "battery staple"),
        ];
        for (i, (email, password)) in attempts.into_iter().enumerate() {
            let result = service.verify_local_credentials(email, password).await;
            assert!(matches!(result, Err(UserError::InvalidCredentials)), "{}", email);
            assert_eq!(hasher.verifications(), i + 1, "no verification for {}", email);
        }

        let user = service
            .verify_local_credentials("alice@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(user.username.as_str(), "alice");
        assert_eq!(hasher.verifications(), attempts.len() + 1);
    }

    #[tokio::test]
    async fn test_register_then_verify_credentials() {
        let (_, service) = in_memory();

        let registered = service
            .register_local(register("alice@example.com", "alice", "correct horse"))
            .await
            .unwrap();

        let verified = service
            .verify_local_credentials("alice@example.com", "correct horse")
            .await
            .expect("valid credentials rejected");
        assert_eq!(verified.id, registered.id);

        let result = service
            .verify_local_credentials("alice@example.com", "battery staple")
            .await;
        assert!(matches!(result, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_single_record() {
        let (repository, service) = in_memory();

        service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();

        let result = service
            .register_local(register("alice@example.com", "alice2", "password456"))
            .await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));

        assert_eq!(repository.len().await, 1);
        let stored = repository
            .find_by_email(&email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.username.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_resolve_external_identity_is_idempotent() {
        let (repository, service) = in_memory();

        let first = service
            .resolve_external_identity(external("001234.apple.sub", Some("a@icloud.com"), None))
            .await
            .unwrap();
        let second = service
            .resolve_external_identity(external("001234.apple.sub", Some("a@icloud.com"), None))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_external_identity_new_user() {
        let (_, service) = in_memory();

        let user = service
            .resolve_external_identity(external("001234.apple.sub", Some("a@icloud.com"), None))
            .await
            .unwrap();

        assert_eq!(user.username.as_str(), "user_001234.a");
        assert_eq!(user.email.as_str(), "a@icloud.com");
        assert_eq!(user.external_email.as_deref(), Some("a@icloud.com"));
        assert_eq!(user.external_id.as_ref().map(|e| e.as_str()), Some("001234.apple.sub"));
        assert!(user.password_hash.is_none());
        assert!(user.preferences.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_external_identity_without_email() {
        let (_, service) = in_memory();

        let user = service
            .resolve_external_identity(external("sub-1", None, Some("chosen")))
            .await
            .unwrap();

        assert_eq!(user.username.as_str(), "chosen");
        assert_eq!(
            user.email,
            EmailAddress::placeholder_for(&ExternalId::new("sub-1".to_string()).unwrap())
        );
        assert!(user.external_email.is_none());

        // A second provider account without email gets its own placeholder
        let other = service
            .resolve_external_identity(external("sub-2", None, Some("other")))
            .await
            .unwrap();
        assert_ne!(user.email, other.email);
    }

    #[tokio::test]
    async fn test_resolve_external_identity_ids_differing_in_punctuation() {
        let (repository, service) = in_memory();

        let pipe = service
            .resolve_external_identity(external("google|1234567", None, Some("pipe")))
            .await
            .unwrap();
        let dash = service
            .resolve_external_identity(external("google-1234567", None, Some("dash")))
            .await
            .unwrap();

        assert_ne!(pipe.id, dash.id);
        assert_ne!(pipe.email, dash.email);
        assert_eq!(repository.len().await, 2);
    }

    #[tokio::test]
    async fn test_resolve_external_identity_email_owned_by_local_user() {
        let (_, service) = in_memory();

        service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();

        let result = service
            .resolve_external_identity(external("sub-1", Some("alice@example.com"), None))
            .await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_resolve_external_identity_lost_race_returns_winner() {
        let mut repository = MockTestUserRepository::new();

        let winner = User {
            password_hash: None,
            external_id: Some(ExternalId::new("sub-1".to_string()).unwrap()),
            ..existing_user()
        };
        let winner_id = winner.id;

        let mut lookups = 0;
        repository
            .expect_find_by_external_id()
            .times(2)
            .returning(move |_| {
                lookups += 1;
                if lookups == 1 {
                    Ok(None)
                } else {
                    Ok(Some(winner.clone()))
                }
            });
        repository
            .expect_email_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_username_exists()
            .times(1)
            .returning(|_| Ok(false));
        repository
            .expect_create()
            .times(1)
            .returning(|_| Err(StoreError::Conflict(UniqueKey::ExternalId)));

        let service = UserService::new(Arc::new(repository));

        let user = service
            .resolve_external_identity(external("sub-1", None, None))
            .await
            .unwrap();
        assert_eq!(user.id, winner_id);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = UserService::new(Arc::new(repository));

        let result = service.get_user(&UserId::new()).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_profile_merges_preferences() {
        let (_, service) = in_memory();

        let user = service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();

        let set_lang = UpdateProfileCommand {
            preferences: Some(preferences(json!({"lang": "en"}))),
            ..Default::default()
        };
        service.update_profile(&user.id, set_lang).await.unwrap();

        let add_theme = UpdateProfileCommand {
            preferences: Some(preferences(json!({"theme": "dark"}))),
            ..Default::default()
        };
        let updated = service.update_profile(&user.id, add_theme).await.unwrap();
        assert_eq!(
            updated.preferences.to_value(),
            json!({"lang": "en", "theme": "dark"})
        );

        let change_lang = UpdateProfileCommand {
            preferences: Some(preferences(json!({"lang": "fr"}))),
            ..Default::default()
        };
        let updated = service.update_profile(&user.id, change_lang).await.unwrap();
        assert_eq!(
            updated.preferences.to_value(),
            json!({"lang": "fr", "theme": "dark"})
        );
    }

    #[tokio::test]
    async fn test_update_profile_fields() {
        let (_, service) = in_memory();

        let user = service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();

        let command = UpdateProfileCommand {
            email: Some(email("alice@new.example.com")),
            username: Some(username("alice_2")),
            avatar_url: Some("https://cdn.example.com/alice.png".to_string()),
            preferences: None,
        };
        let updated = service.update_profile(&user.id, command).await.unwrap();

        assert_eq!(updated.email.as_str(), "alice@new.example.com");
        assert_eq!(updated.username.as_str(), "alice_2");
        assert_eq!(
            updated.avatar_url.as_deref(),
            Some("https://cdn.example.com/alice.png")
        );
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_update_profile_same_values_is_noop_for_uniqueness() {
        let (_, service) = in_memory();

        let user = service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();

        let command = UpdateProfileCommand {
            email: Some(email("alice@example.com")),
            username: Some(username("alice")),
            ..Default::default()
        };
        let updated = service.update_profile(&user.id, command).await.unwrap();
        assert_eq!(updated.email, user.email);
    }

    #[tokio::test]
    async fn test_update_profile_conflict_leaves_record_unmodified() {
        let (repository, service) = in_memory();

        service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();
        let bob = service
            .register_local(register("bob@example.com", "bob", "password123"))
            .await
            .unwrap();

        let command = UpdateProfileCommand {
            email: Some(email("bob@new.example.com")),
            username: Some(username("alice")),
            avatar_url: Some("https://cdn.example.com/bob.png".to_string()),
            preferences: Some(preferences(json!({"lang": "de"}))),
        };
        let result = service.update_profile(&bob.id, command).await;
        assert!(matches!(result, Err(UserError::DuplicateUsername)));

        let stored = repository.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(stored, bob);

        let command = UpdateProfileCommand {
            email: Some(email("alice@example.com")),
            ..Default::default()
        };
        let result = service.update_profile(&bob.id, command).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_update_profile_not_found() {
        let (_, service) = in_memory();

        let result = service
            .update_profile(&UserId::new(), UpdateProfileCommand::default())
            .await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_, service) = in_memory();

        let result = service.delete_user(&UserId::new()).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));

        let user = service
            .register_local(register("alice@example.com", "alice", "password123"))
            .await
            .unwrap();

        service.delete_user(&user.id).await.unwrap();

        let result = service.get_user(&user.id).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user_vanished_between_lookup_and_delete() {
        let mut repository = MockTestUserRepository::new();

        let user = existing_user();
        let user_id = user.id;
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_delete()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(false));

        let service = UserService::new(Arc::new(repository));

        let result = service.delete_user(&user_id).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_timeout_surfaces_unavailable() {
        let service = UserService::new(Arc::new(StalledRepository))
            .with_store_timeout(Duration::from_millis(20));

        let result = service.get_user(&UserId::new()).await;
        assert!(matches!(result, Err(UserError::StoreUnavailable(_))));

        let result = service
            .verify_local_credentials("alice@example.com", "password123")
            .await;
        assert!(matches!(result, Err(UserError::StoreUnavailable(_))));
    }
}
