use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::repo::StoreError;

/// Failures surfaced by account operations. The response carries only a
/// status code and a short client-safe message.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("user doesn't exist")]
    NotFound,
    #[error("check the input email and password")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("you cannot do this operation")]
    Forbidden,
    #[error("the email has already been registered")]
    Conflict,
    #[error("unknown error occurs")]
    Internal(anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::NotFound
            | AuthError::InvalidCredentials
            | AuthError::Conflict => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized(_) | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::Conflict,
            StoreError::Database(e) => AuthError::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Internal(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(e) = &self {
            error!(error = %e, "internal failure");
        }
        (self.status(), self.to_string()).into_response()
    }
}
