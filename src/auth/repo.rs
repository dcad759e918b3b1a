use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, UserIdentity, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint on `users.email` rejected the insert.
    #[error("email already registered")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::EmailTaken,
            _ => StoreError::Other(e.into()),
        }
    }
}

/// Persistent user table. Implementations must enforce email uniqueness.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserIdentity>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, StoreError>;
    async fn create(&self, user: NewUser) -> Result<UserIdentity, StoreError>;
    /// Record that `provider`/`provider_account_id` belongs to `user_id`. Idempotent.
    async fn link_account(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), StoreError>;
}

const USER_COLUMNS: &str =
    "id, email, name, first_name, last_name, username, hashed_password, user_type";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserIdentity>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(UserIdentity::try_from).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(UserIdentity::try_from).transpose()?)
    }

    async fn create(&self, user: NewUser) -> Result<UserIdentity, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, name, first_name, last_name, username, hashed_password, user_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.hashed_password)
        .bind(user.user_type.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(UserIdentity::try_from(row)?)
    }

    async fn link_account(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (provider, provider_account_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_account_id) DO NOTHING
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
