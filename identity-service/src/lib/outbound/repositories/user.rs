use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::ExternalId;
use crate::domain::user::models::Preferences;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::StoreError;
use crate::user::errors::UniqueKey;

const SELECT_USER: &str = r#"
    SELECT id, email, username, password_hash, avatar_url, preferences,
           external_id, external_email, created_at
    FROM users
"#;

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<User>, StoreError> {
        let query = format!("{} WHERE {} = $1", SELECT_USER, filter);

        sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map(User::try_from)
            .transpose()
    }

    async fn exists(&self, filter: &str, value: &str) -> Result<bool, StoreError> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {} = $1)", filter);

        sqlx::query_scalar::<_, bool>(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: Option<String>,
    avatar_url: Option<String>,
    preferences: Json<Preferences>,
    external_id: Option<String>,
    external_email: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |e: String| StoreError::Unavailable(format!("corrupt user row {}: {}", id, e));

        Ok(User {
            id: UserId(row.id),
            email: EmailAddress::new(row.email).map_err(|e| corrupt(e.to_string()))?,
            username: Username::new(row.username).map_err(|e| corrupt(e.to_string()))?,
            password_hash: row.password_hash,
            avatar_url: row.avatar_url,
            preferences: row.preferences.0,
            external_id: row
                .external_id
                .map(ExternalId::new)
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
            external_email: row.external_email,
            created_at: row.created_at,
        })
    }
}

/// Translate a write failure, surfacing unique constraint violations as conflicts.
///
/// The constraints are the source of truth for uniqueness; any pre-check done by
/// the caller is only a fast path.
fn write_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("users_email_key") => return StoreError::Conflict(UniqueKey::Email),
                Some("users_username_key") => return StoreError::Conflict(UniqueKey::Username),
                Some("users_external_id_key") => {
                    return StoreError::Conflict(UniqueKey::ExternalId)
                }
                _ => {}
            }
        }
    }
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, avatar_url, preferences,
                               external_id, external_email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.0)
        .bind(user.email.as_str())
        .bind(user.username.as_str())
        .bind(user.password_hash.as_deref())
        .bind(user.avatar_url.as_deref())
        .bind(Json(&user.preferences))
        .bind(user.external_id.as_ref().map(ExternalId::as_str))
        .bind(user.external_email.as_deref())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let query = format!("{} WHERE id = $1", SELECT_USER);

        sqlx::query_as::<_, UserRow>(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        self.find_one("email", email.as_str()).await
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        self.find_one("username", username.as_str()).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<User>, StoreError> {
        self.find_one("external_id", external_id.as_str()).await
    }

    async fn update(&self, user: User) -> Result<Option<User>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, username = $3, password_hash = $4, avatar_url = $5, preferences = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id.0)
        .bind(user.email.as_str())
        .bind(user.username.as_str())
        .bind(user.password_hash.as_deref())
        .bind(user.avatar_url.as_deref())
        .bind(Json(&user.preferences))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(user))
    }

    async fn delete(&self, id: &UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn email_exists(&self, email: &EmailAddress) -> Result<bool, StoreError> {
        self.exists("email", email.as_str()).await
    }

    async fn username_exists(&self, username: &Username) -> Result<bool, StoreError> {
        self.exists("username", username.as_str()).await
    }
}
