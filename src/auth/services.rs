//! Account operations. Each one validates its input, talks to the store and
//! returns the public view of the user; handlers only add HTTP framing.
//!
//! Check-then-act sequences here (duplicate-email pre-check, verify then
//! rotate) are not atomic. The store's unique constraint on email is the
//! hard guarantee; the pre-check only gives a nicer early error.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    dto::{ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest},
    errors::AuthError,
    extractors::require_owner,
    repo_types::{NewUser, User, UserPatch},
    session,
};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_id(id: &str) -> bool {
    lazy_static! {
        static ref ID_RE: Regex = Regex::new(r"^[0-9a-f]{24}$").unwrap();
    }
    ID_RE.is_match(id)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<PublicUser, AuthError> {
    let email = normalize_email(&req.email);
    let username = req.username.trim().to_string();

    if email.is_empty() || username.is_empty() || req.password.is_empty() {
        warn!("register with missing fields");
        return Err(AuthError::Validation("error request body"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email"));
    }

    if state.store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::Conflict);
    }

    let (salt, hash) = state.hasher.derive_blocking(req.password.clone()).await?;
    let avatar = req.avatar.filter(|a| !a.trim().is_empty());
    let user = state
        .store
        .create(NewUser {
            email,
            username,
            avatar,
            salt,
            hash,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

/// Verifies the password and mints a session. Returns the public view and
/// the token to put in the cookie.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<(PublicUser, String), AuthError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() || !is_valid_email(&email) {
        warn!("login with malformed input");
        return Err(AuthError::Validation("Please input the correct email and password."));
    }

    let Some(found) = state.store.find_by_email_with_credential(&email).await? else {
        // Same work as a real check so timing does not reveal unknown emails.
        let _ = state
            .hasher
            .verify_blocking("0000000000000000".into(), req.password.clone(), String::new())
            .await;
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    let cred = &found.credential;
    if !state
        .hasher
        .verify_blocking(cred.salt.clone(), req.password.clone(), cred.hash.clone())
        .await?
    {
        warn!(email = %email, user_id = %found.user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = session::mint(state, &found.user).await?;
    info!(user_id = %found.user.id, email = %found.user.email, "user logged in");
    Ok((found.user.into(), token))
}

/// Ends the session named by `token`. Fails without a cookie or for an
/// unknown token; nothing is changed in either case.
pub async fn logout(state: &AppState, token: Option<String>) -> Result<(), AuthError> {
    let token = token.ok_or(AuthError::Validation("You haven't logged in."))?;
    let Some(user) = session::validate(state, &token).await? else {
        warn!("logout with unknown token");
        return Err(AuthError::Validation("Token not exist."));
    };
    session::invalidate(state, &user).await?;
    info!(user_id = %user.id, "user logged out");
    Ok(())
}

pub async fn login_status(state: &AppState, token: Option<String>) -> Result<PublicUser, AuthError> {
    let token = token.ok_or(AuthError::Unauthorized("You haven't logged in."))?;
    session::validate(state, &token)
        .await?
        .map(PublicUser::from)
        .ok_or(AuthError::Unauthorized("session token not exist"))
}

/// Service-to-service introspection: who owns this token, if anyone.
pub async fn authenticate_status(state: &AppState, token: &str) -> Result<PublicUser, AuthError> {
    if token.is_empty() {
        return Err(AuthError::Validation("token error"));
    }
    match session::validate(state, token).await? {
        Some(user) => Ok(user.into()),
        None => {
            warn!("introspection of unknown token");
            Err(AuthError::NotFound)
        }
    }
}

/// Rotates salt and hash. When the password-change policy demands a session,
/// `identity` must be present and own the email in the request.
pub async fn change_password(
    state: &AppState,
    identity: Option<&User>,
    req: ChangePasswordRequest,
) -> Result<(), AuthError> {
    if state.config.policy.change_password_requires_session {
        let identity = identity.ok_or(AuthError::Unauthorized("You haven't logged in."))?;
        require_owner(identity, &req.email)?;
    }

    if req.old_password == req.new_password {
        warn!("new password equals old password");
        return Err(AuthError::Validation("The new password is the same as the old one."));
    }
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) || req.new_password.is_empty() {
        return Err(AuthError::Validation("error request body"));
    }

    let Some(found) = state.store.find_by_email_with_credential(&email).await? else {
        warn!(email = %email, "change password for unknown user");
        return Err(AuthError::NotFound);
    };
    let cred = &found.credential;
    if !state
        .hasher
        .verify_blocking(cred.salt.clone(), req.old_password.clone(), cred.hash.clone())
        .await?
    {
        warn!(user_id = %found.user.id, "change password with wrong old password");
        return Err(AuthError::Validation("Please input the correct old password."));
    }

    let (salt, hash) = state.hasher.derive_blocking(req.new_password.clone()).await?;
    if !state.store.set_credential(&found.user.id, &salt, &hash).await? {
        return Err(AuthError::NotFound);
    }
    info!(user_id = %found.user.id, "password changed");
    Ok(())
}

pub async fn change_username(
    state: &AppState,
    identity: &User,
    username: &str,
) -> Result<PublicUser, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::Validation("The username is null."));
    }
    let patch = UserPatch {
        username: Some(username.to_string()),
        ..UserPatch::default()
    };
    let user = state
        .store
        .update(&identity.id, patch)
        .await?
        .ok_or(AuthError::NotFound)?;
    info!(user_id = %user.id, "username changed");
    Ok(user.into())
}

/// Caller must have passed the owner gate for `identity`.
pub async fn change_avatar(
    state: &AppState,
    identity: &User,
    avatar: &str,
) -> Result<PublicUser, AuthError> {
    let avatar = avatar.trim();
    if avatar.is_empty() {
        return Err(AuthError::Validation("The avatar is null."));
    }
    let patch = UserPatch {
        avatar: Some(avatar.to_string()),
        ..UserPatch::default()
    };
    let user = state
        .store
        .update(&identity.id, patch)
        .await?
        .ok_or(AuthError::NotFound)?;
    info!(user_id = %user.id, "avatar changed");
    Ok(user.into())
}

/// Permanently removes the account. Caller must have passed the owner gate.
pub async fn delete_user(state: &AppState, identity: &User) -> Result<(), AuthError> {
    if !state.store.delete_by_email(&identity.email).await? {
        return Err(AuthError::NotFound);
    }
    info!(user_id = %identity.id, email = %identity.email, "user deleted");
    Ok(())
}

pub async fn user_info(state: &AppState, id: &str) -> Result<PublicUser, AuthError> {
    if !is_valid_id(id) {
        return Err(AuthError::Validation("id is need to get user information"));
    }
    state
        .store
        .find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or(AuthError::NotFound)
}

pub async fn list_all(state: &AppState) -> Result<Vec<PublicUser>, AuthError> {
    let users = state.store.list_all().await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}
