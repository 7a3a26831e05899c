use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Subject of a verified access token. Says nothing about whether the
/// account still exists; use `CurrentUser` and friends for that.
pub struct AuthUser(pub Uuid);

/// Token subject resolved against the live user record.
pub struct CurrentUser(pub User);

/// `CurrentUser` whose account is active.
pub struct ActiveUser(pub User);

/// `ActiveUser` with the superuser flag.
pub struct Superuser(pub User);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidJwt)?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::InvalidJwt)
}

pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    let token = bearer_token(headers)?;
    let claims = JwtKeys::from_ref(state).verify(token, TokenKind::Access)?;
    Ok(claims.sub)
}

pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user_id = authenticate(state, headers)?;
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::CurrentUserNotFound)
}

pub async fn active_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = current_user(state, headers).await?;
    if !user.is_active {
        return Err(AppError::CurrentUserInactive);
    }
    Ok(user)
}

pub async fn superuser(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = active_user(state, headers).await?;
    if !user.is_superuser {
        return Err(AppError::CurrentUserNotSuperuser);
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        authenticate(state, &parts.headers).map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        current_user(state, &parts.headers).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        active_user(state, &parts.headers).await.map(ActiveUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        superuser(state, &parts.headers).await.map(Superuser)
    }
}
