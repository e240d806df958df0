use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ChangeAvatarRequest, ChangePasswordRequest, ChangeUsernameRequest, CheckRequest,
            DeleteUserRequest, LoginRequest, PublicUser, RegisterRequest,
        },
        errors::AuthError,
        extractors::{Identity, MaybeIdentity, Owned},
        services, session,
    },
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", put(register))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/user/login/status", post(login_status))
        .route("/user/check", post(check))
        .route("/user/change-password", post(change_password))
        .route("/user/change-username", post(change_username))
        .route("/user/change-avatar", post(change_avatar))
        .route("/user/delete", delete(delete_user))
        .route("/user/list", get(list_users))
        .route("/user/:id", get(user_info))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    services::register(&state, payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let (user, token) = services::login(&state, payload).await?;
    let cookie = session::session_cookie(&state.config.session, &token)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let token = session::read_cookie(&headers, &state.config.session.cookie_name);
    services::logout(&state, token).await?;
    let cookie = session::clear_cookie(&state.config.session)?;
    Ok(([(header::SET_COOKIE, cookie)], StatusCode::OK).into_response())
}

#[instrument(skip(state, headers))]
pub async fn login_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, AuthError> {
    let token = session::read_cookie(&headers, &state.config.session.cookie_name);
    services::login_status(&state, token).await.map(Json)
}

/// Token introspection for other services. Deliberately ungated.
#[instrument(skip(state, payload))]
pub async fn check(
    State(state): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    services::authenticate_status(&state, &payload.session_token)
        .await
        .map(Json)
}

#[instrument(skip(state, identity, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AuthError> {
    services::change_password(&state, identity.as_ref(), payload).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, identity, payload))]
pub async fn change_username(
    State(state): State<AppState>,
    Identity(identity): Identity,
    Json(payload): Json<ChangeUsernameRequest>,
) -> Result<StatusCode, AuthError> {
    services::change_username(&state, &identity, &payload.username).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, owned))]
pub async fn change_avatar(
    State(state): State<AppState>,
    owned: Owned<ChangeAvatarRequest>,
) -> Result<StatusCode, AuthError> {
    services::change_avatar(&state, &owned.identity, &owned.body.avatar).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, owned))]
pub async fn delete_user(
    State(state): State<AppState>,
    owned: Owned<DeleteUserRequest>,
) -> Result<StatusCode, AuthError> {
    services::delete_user(&state, &owned.identity).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, identity))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    if !state.config.policy.user_list_public && identity.is_none() {
        return Err(AuthError::Unauthorized("You haven't logged in."));
    }
    services::list_all(&state).await.map(Json)
}

#[instrument(skip(state))]
pub async fn user_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AuthError> {
    services::user_info(&state, &id).await.map(Json)
}
