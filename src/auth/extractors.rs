use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{dto::OwnedRequest, errors::AuthError, repo_types::User, session};
use crate::state::AppState;

/// Authenticated gate: resolves the `sessionToken` cookie to its user.
///
/// Rejects with 403 when the cookie is missing or matches no user. The
/// resolved user travels to the handler by value.
pub struct Identity(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session::read_cookie(&parts.headers, &state.config.session.cookie_name)
            .ok_or(AuthError::Unauthorized("You haven't logged in."))?;

        match session::validate(state, &token).await? {
            Some(user) => Ok(Identity(user)),
            None => {
                warn!("session token not found");
                Err(AuthError::Unauthorized("session token not exist"))
            }
        }
    }
}

/// Optional form of [`Identity`] for routes whose gating is a policy choice.
///
/// `None` only when no cookie is sent or the token matches no user; store
/// failures still reject with their own error.
pub struct MaybeIdentity(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session::read_cookie(&parts.headers, &state.config.session.cookie_name)
        else {
            return Ok(MaybeIdentity(None));
        };
        Ok(MaybeIdentity(session::validate(state, &token).await?))
    }
}

/// Owner gate: the email named by the body must be the authenticated user's.
pub fn require_owner(identity: &User, claimed_email: &str) -> Result<(), AuthError> {
    if identity.email == claimed_email.trim().to_lowercase() {
        Ok(())
    } else {
        warn!(user_id = %identity.id, "owner check failed");
        Err(AuthError::Forbidden)
    }
}

/// Authenticated gate followed by the owner gate over a JSON body.
pub struct Owned<T> {
    pub identity: User,
    pub body: T,
}

#[async_trait]
impl<T> FromRequest<AppState> for Owned<T>
where
    T: DeserializeOwned + OwnedRequest + Send,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let Identity(identity) = Identity::from_request_parts(&mut parts, state).await?;

        let req = Request::from_parts(parts, body);
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(|_| AuthError::Validation("error request body"))?;

        require_owner(&identity, body.owner_email())?;
        Ok(Owned { identity, body })
    }
}
