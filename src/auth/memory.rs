use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::repo::{generate_id, StoreError, StoreResult, UserStore};
use crate::auth::repo_types::{Credential, NewUser, User, UserPatch, UserWithCredential};

/// In-process [`UserStore`] keyed by id. Email uniqueness is checked under the write lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserWithCredential>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw credential lookup, for assertions on what was persisted.
    pub async fn credential_of(&self, email: &str) -> Option<Credential> {
        self.users
            .read()
            .await
            .values()
            .find(|r| r.user.email == email)
            .map(|r| r.credential.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|r| r.user.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: generate_id(),
            email: new.email,
            username: new.username,
            avatar: new.avatar,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(
            user.id.clone(),
            UserWithCredential {
                user: user.clone(),
                credential: Credential {
                    salt: new.salt,
                    hash: new.hash,
                    session_token: None,
                },
            },
        );
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(id).map(|r| r.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|r| r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn find_by_email_with_credential(
        &self,
        email: &str,
    ) -> StoreResult<Option<UserWithCredential>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|r| r.user.email == email)
            .cloned())
    }

    async fn find_by_session_token(&self, token: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|r| r.credential.session_token.as_deref() == Some(token))
            .map(|r| r.user.clone()))
    }

    async fn set_session_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(id) {
            Some(r) => {
                r.credential.session_token = token.map(str::to_owned);
                true
            }
            None => false,
        })
    }

    async fn set_credential(&self, id: &str, salt: &str, hash: &str) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(id) {
            Some(r) => {
                r.credential.salt = salt.to_owned();
                r.credential.hash = hash.to_owned();
                true
            }
            None => false,
        })
    }

    async fn update(&self, id: &str, patch: UserPatch) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(r) = users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(username) = patch.username {
            r.user.username = username;
        }
        if let Some(avatar) = patch.avatar {
            r.user.avatar = Some(avatar);
        }
        Ok(Some(r.user.clone()))
    }

    async fn delete_by_email(&self, email: &str) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, r| r.user.email != email);
        Ok(users.len() < before)
    }

    async fn list_all(&self) -> StoreResult<Vec<User>> {
        let mut all: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .map(|r| r.user.clone())
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

/// [`UserStore`] whose every call fails as if the connection pool were exhausted.
pub struct UnavailableUserStore;

fn unavailable<T>() -> StoreResult<T> {
    Err(StoreError::Database(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl UserStore for UnavailableUserStore {
    async fn create(&self, _new: NewUser) -> StoreResult<User> {
        unavailable()
    }

    async fn find_by_id(&self, _id: &str) -> StoreResult<Option<User>> {
        unavailable()
    }

    async fn find_by_email(&self, _email: &str) -> StoreResult<Option<User>> {
        unavailable()
    }

    async fn find_by_email_with_credential(
        &self,
        _email: &str,
    ) -> StoreResult<Option<UserWithCredential>> {
        unavailable()
    }

    async fn find_by_session_token(&self, _token: &str) -> StoreResult<Option<User>> {
        unavailable()
    }

    async fn set_session_token(&self, _id: &str, _token: Option<&str>) -> StoreResult<bool> {
        unavailable()
    }

    async fn set_credential(&self, _id: &str, _salt: &str, _hash: &str) -> StoreResult<bool> {
        unavailable()
    }

    async fn update(&self, _id: &str, _patch: UserPatch) -> StoreResult<Option<User>> {
        unavailable()
    }

    async fn delete_by_email(&self, _email: &str) -> StoreResult<bool> {
        unavailable()
    }

    async fn list_all(&self) -> StoreResult<Vec<User>> {
        unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            username: "someone".into(),
            avatar: None,
            salt: "salt-salt-salt".into(),
            hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.expect("first create");
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_merges_only_provided_fields() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");

        let patch = UserPatch {
            avatar: Some("https://img/a.png".into()),
            ..UserPatch::default()
        };
        let updated = store.update(&user.id, patch).await.expect("update").expect("exists");
        assert_eq!(updated.username, "someone");
        assert_eq!(updated.avatar.as_deref(), Some("https://img/a.png"));
    }

    #[tokio::test]
    async fn session_token_lookup_follows_latest_value() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");

        assert!(store.set_session_token(&user.id, Some("t1")).await.unwrap());
        assert!(store.set_session_token(&user.id, Some("t2")).await.unwrap());
        assert!(store.find_by_session_token("t1").await.unwrap().is_none());
        assert_eq!(store.find_by_session_token("t2").await.unwrap(), Some(user.clone()));

        assert!(store.set_session_token(&user.id, None).await.unwrap());
        assert!(store.find_by_session_token("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");
        assert!(store.delete_by_email("a@x.com").await.unwrap());
        assert!(!store.delete_by_email("a@x.com").await.unwrap());
        assert!(store.find_by_id(&user.id).await.unwrap().is_none());
        assert!(store.credential_of("a@x.com").await.is_none());
    }
}
