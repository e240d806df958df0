use serde::{Deserialize, Serialize};

use crate::auth::repo_types::User;

/// Request body for registration. Missing fields deserialize as empty and are
/// rejected by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeUsernameRequest {
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeAvatarRequest {
    pub email: String,
    pub avatar: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteUserRequest {
    pub email: String,
}

/// Service-to-service token introspection.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckRequest {
    pub session_token: String,
}

/// Bodies that name the owner of the resource they act on.
pub trait OwnedRequest {
    fn owner_email(&self) -> &str;
}

impl OwnedRequest for ChangeAvatarRequest {
    fn owner_email(&self) -> &str {
        &self.email
    }
}

impl OwnedRequest for DeleteUserRequest {
    fn owner_email(&self) -> &str {
        &self.email
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            avatar: u.avatar,
        }
    }
}
