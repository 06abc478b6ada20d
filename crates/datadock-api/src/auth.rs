//! Request authentication
//!
//! Sessions and logins are handled by the fronting proxy, which forwards the
//! authenticated username in `X-Authenticated-User`. The middleware resolves
//! it against the user registry and stores the user in the request
//! extensions for the [`AuthenticatedUser`] extractor.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use datadock_core::{AppError, User};
use std::sync::Arc;

pub const AUTH_USER_HEADER: &str = "X-Authenticated-User";

/// The user making the request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Authentication required".into())))
    }
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let username = request
        .headers()
        .get(AUTH_USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let Some(username) = username else {
        return HttpAppError(AppError::Unauthorized("Authentication required".into()))
            .into_response();
    };

    match state.users.find_by_username(&username).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        Ok(None) => {
            tracing::warn!(username = %username, "Unknown authenticated user");
            HttpAppError(AppError::Unauthorized("Unknown user".into())).into_response()
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
