use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
/// Resolves to `None` without an `Authorization` header; a bad token is still rejected.
pub(crate) struct MaybeUser(pub(crate) Option<User>);
pub(crate) struct CurrentInstructor(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

async fn resolve_bearer(
    parts: &mut Parts,
    state: &AppState,
    header_value: &str,
) -> Result<User, ApiError> {
    let State(app_state) = State::<AppState>::from_request_parts(parts, state)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

    let claims = security::verify_token(token, app_state.settings())
        .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

    let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

    let Some(user) = user else {
        return Err(ApiError::Unauthorized("User not found"));
    };

    if !user.is_active {
        return Err(ApiError::Unauthorized("Invalid authentication credentials"));
    }

    Ok(user)
}

fn authorization_header(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = authorization_header(parts)
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;
        resolve_bearer(parts, state, &header_value).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authorization_header(parts) {
            Some(header_value) => {
                resolve_bearer(parts, state, &header_value).await.map(|user| MaybeUser(Some(user)))
            }
            None => Ok(MaybeUser(None)),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentInstructor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role.can_teach() {
            Ok(CurrentInstructor(user))
        } else {
            Err(ApiError::Forbidden("Instructor access required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

/// Owner of the resource or an admin.
pub(crate) fn can_manage(user: &User, owner_id: &str) -> bool {
    user.role == UserRole::Admin || user.id == owner_id
}

pub(crate) fn require_manager(user: &User, owner_id: &str) -> Result<(), ApiError> {
    if can_manage(user, owner_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not enough permissions"))
    }
}
