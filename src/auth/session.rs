//! Session tokens: minting, validation, invalidation and the cookie that
//! carries them.
//!
//! One active token per user; the latest login wins and silently supersedes
//! any earlier token. Expiry is enforced by the cookie's client-side lifetime,
//! which is re-stamped on every request that presents a token.

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::auth::{errors::AuthError, password::generate_random_token, repo_types::User};
use crate::config::SessionConfig;
use crate::state::AppState;

const HTTP_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Issues a fresh token for `user`, overwriting whatever token it had.
pub async fn mint(state: &AppState, user: &User) -> Result<String, AuthError> {
    let token = generate_random_token();
    if !state.store.set_session_token(&user.id, Some(&token)).await? {
        warn!(user_id = %user.id, "mint for vanished user");
        return Err(AuthError::NotFound);
    }
    debug!(user_id = %user.id, "session minted");
    Ok(token)
}

/// Resolves the owner of `token`, if any.
pub async fn validate(state: &AppState, token: &str) -> Result<Option<User>, AuthError> {
    if token.is_empty() {
        return Ok(None);
    }
    let user = state.store.find_by_session_token(token).await?;
    if let Some(u) = &user {
        debug!(user_id = %u.id, "session validated");
    }
    Ok(user)
}

/// Clears the stored token. The caller must also send [`clear_cookie`].
pub async fn invalidate(state: &AppState, user: &User) -> Result<(), AuthError> {
    state.store.set_session_token(&user.id, None).await?;
    debug!(user_id = %user.id, "session invalidated");
    Ok(())
}

/// Value of the cookie named `name`, if the request carries a non-empty one.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value carrying `token` for the configured lifetime.
pub fn session_cookie(cfg: &SessionConfig, token: &str) -> anyhow::Result<HeaderValue> {
    let expires = OffsetDateTime::now_utc()
        .checked_add(Duration::seconds(cfg.ttl_seconds))
        .context("session lifetime out of range")?;
    let value = format!(
        "{}={}; Path=/; Max-Age={}; Expires={}; HttpOnly; SameSite=Lax",
        cfg.cookie_name,
        token,
        cfg.ttl_seconds,
        expires.format(HTTP_DATE)?
    );
    Ok(HeaderValue::from_str(&value)?)
}

/// `Set-Cookie` value that makes the client drop the session cookie.
pub fn clear_cookie(cfg: &SessionConfig) -> anyhow::Result<HeaderValue> {
    let value = format!(
        "{}=; Path=/; Max-Age=0; Expires={}; HttpOnly; SameSite=Lax",
        cfg.cookie_name,
        OffsetDateTime::UNIX_EPOCH.format(HTTP_DATE)?
    );
    Ok(HeaderValue::from_str(&value)?)
}

/// Sliding expiration: re-stamps the presented token with a fresh lifetime
/// unless the handler already set or cleared the cookie itself.
pub async fn refresh_cookie(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let cfg = &state.config.session;
    let token = read_cookie(req.headers(), &cfg.cookie_name);
    let mut res = next.run(req).await;

    let Some(token) = token else {
        return res;
    };
    let prefix = format!("{}=", cfg.cookie_name);
    let already_set = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().map(|s| s.starts_with(&prefix)).unwrap_or(false));
    if already_set {
        return res;
    }

    match session_cookie(cfg, &token) {
        Ok(v) => {
            res.headers_mut().append(header::SET_COOKIE, v);
        }
        Err(e) => warn!(error = %e, "cookie refresh failed"),
    }
    res
}
