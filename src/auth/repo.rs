use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User, UserPatch, UserWithCredential};

/// Name of the unique constraint on `users.email` (see migrations).
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of user records and their credentials.
///
/// Lookups that return [`User`] never carry credential fields; only
/// [`UserStore::find_by_email_with_credential`] does.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a user with a fresh server-generated id.
    async fn create(&self, new: NewUser) -> StoreResult<User>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_email_with_credential(
        &self,
        email: &str,
    ) -> StoreResult<Option<UserWithCredential>>;
    async fn find_by_session_token(&self, token: &str) -> StoreResult<Option<User>>;
    /// Overwrites (or clears, with `None`) the session token. Returns false if no such user.
    async fn set_session_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool>;
    /// Replaces salt and hash together. Returns false if no such user.
    async fn set_credential(&self, id: &str, salt: &str, hash: &str) -> StoreResult<bool>;
    async fn update(&self, id: &str, patch: UserPatch) -> StoreResult<Option<User>>;
    /// Removes the user and credential. Returns false if nothing matched.
    async fn delete_by_email(&self, email: &str) -> StoreResult<bool>;
    async fn list_all(&self) -> StoreResult<Vec<User>>;
}

/// 12 random bytes as 24 lowercase hex chars.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 12];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

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
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, avatar, salt, hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, username, avatar, created_at
            "#,
        )
        .bind(generate_id())
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.avatar)
        .bind(&new.salt)
        .bind(&new.hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) => {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, avatar, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, avatar, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email_with_credential(
        &self,
        email: &str,
    ) -> StoreResult<Option<UserWithCredential>> {
        let row = sqlx::query_as::<_, UserWithCredential>(
            r#"
            SELECT id, email, username, avatar, created_at, salt, hash, session_token
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_session_token(&self, token: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, avatar, created_at
            FROM users
            WHERE session_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_session_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool> {
        let res = sqlx::query(r#"UPDATE users SET session_token = $2 WHERE id = $1"#)
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_credential(&self, id: &str, salt: &str, hash: &str) -> StoreResult<bool> {
        let res = sqlx::query(r#"UPDATE users SET salt = $2, hash = $3 WHERE id = $1"#)
            .bind(id)
            .bind(salt)
            .bind(hash)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   avatar = COALESCE($3, avatar)
             WHERE id = $1
            RETURNING id, email, username, avatar, created_at
            "#,
        )
        .bind(id)
        .bind(patch.username)
        .bind(patch.avatar)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_by_email(&self, email: &str) -> StoreResult<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE email = $1"#)
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_all(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, avatar, created_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}
