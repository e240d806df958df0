use sqlx::FromRow;
use time::OffsetDateTime;

/// Sensitive part of a user record. Only loaded for login and password change.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
    pub session_token: Option<String>, // None while logged out
}

/// User record without credential fields.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: String,       // 24 lowercase hex chars
    pub email: String,    // unique
    pub username: String,
    pub avatar: Option<String>,
    pub created_at: OffsetDateTime,
}

/// User record joined with its credential.
#[derive(Debug, Clone, FromRow)]
pub struct UserWithCredential {
    #[sqlx(flatten)]
    pub user: User,
    #[sqlx(flatten)]
    pub credential: Credential,
}

/// Fields accepted by a partial update. `None` leaves the column alone.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

/// Everything needed to persist a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub avatar: Option<String>,
    pub salt: String,
    pub hash: String,
}
