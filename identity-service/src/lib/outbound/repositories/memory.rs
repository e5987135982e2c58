use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::ExternalId;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::StoreError;
use crate::user::errors::UniqueKey;

/// In-process credential store.
///
/// Unique keys are checked and written under a single write lock, so concurrent
/// creates cannot both claim the same email, username or external ID.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Find the first unique key `candidate` would collide on, ignoring its own record.
    fn conflict(users: &HashMap<UserId, User>, candidate: &User) -> Option<UniqueKey> {
        let others = || users.values().filter(|u| u.id != candidate.id);

        if others().any(|u| u.email == candidate.email) {
            return Some(UniqueKey::Email);
        }
        if others().any(|u| u.username == candidate.username) {
            return Some(UniqueKey::Username);
        }
        if let Some(external_id) = &candidate.external_id {
            if others().any(|u| u.external_id.as_ref() == Some(external_id)) {
                return Some(UniqueKey::ExternalId);
            }
        }
        None
    }

    async fn find_by<P>(&self, predicate: P) -> Option<User>
    where
        P: Fn(&User) -> bool,
    {
        self.users
            .read()
            .await
            .values()
            .find(|u| predicate(u))
            .cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if let Some(key) = Self::conflict(&users, &user) {
            return Err(StoreError::Conflict(key));
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        Ok(self.find_by(|u| &u.email == email).await)
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        Ok(self.find_by(|u| &u.username == username).await)
    }

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .find_by(|u| u.external_id.as_ref() == Some(external_id))
            .await)
    }

    async fn update(&self, user: User) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Ok(None);
        }
        if let Some(key) = Self::conflict(&users, &user) {
            return Err(StoreError::Conflict(key));
        }

        users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn delete(&self, id: &UserId) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(id).is_some())
    }

    async fn email_exists(&self, email: &EmailAddress) -> Result<bool, StoreError> {
        Ok(self.find_by(|u| &u.email == email).await.is_some())
    }

    async fn username_exists(&self, username: &Username) -> Result<bool, StoreError> {
        Ok(self.find_by(|u| &u.username == username).await.is_some())
    }
}
