use std::{fmt::Display, str::FromStr};

use axum::http::{HeaderName, StatusCode, header};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::Json,
    models::Api,
    permission::{ExecutionContext, RolePermission, RolePermissionAction, require_permission},
    repository::Repository,
};

pub mod apis;
pub mod logs;
pub mod members;
pub mod metadata;
pub mod plans;
pub mod subscriptions;
pub mod user;

/// A `201 Created` answer with its `Location` header.
pub type Created<T> = (StatusCode, [(HeaderName, String); 1], Json<T>);

pub(crate) fn created<T>(location: String, body: T) -> Created<T> {
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body))
}

/// load_api
///
/// An API from another environment is reported exactly like a missing one.
pub(crate) async fn load_api(
    repo: &dyn Repository,
    ctx: &ExecutionContext,
    api_id: Uuid,
) -> Result<Api, ApiError> {
    repo.find_api(api_id)
        .await?
        .filter(|api| api.environment_id == ctx.environment_id)
        .ok_or_else(|| ApiError::not_found("Api", api_id))
}

/// authorize_api
///
/// The guard shared by every API sub-resource: environment, then permission,
/// then the API itself.
pub(crate) async fn authorize_api(
    state: &AppState,
    user: &AuthUser,
    env_id: &str,
    api_id: Uuid,
    permission: RolePermission,
    action: RolePermissionAction,
) -> Result<(ExecutionContext, Api), ApiError> {
    let repo = state.repo.as_ref();
    let ctx = ExecutionContext::resolve(repo, env_id).await?;
    require_permission(repo, &ctx, user, permission, &api_id.to_string(), action).await?;
    let api = load_api(repo, &ctx, api_id).await?;
    Ok((ctx, api))
}

/// parse_list
///
/// Parses a comma-separated query parameter. Blank entries are skipped.
pub(crate) fn parse_list<T>(raw: Option<&str>, field: &str) -> Result<Vec<T>, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>()
                .map_err(|e| ApiError::validation(format!("Invalid {field} value [{item}]: {e}")))
        })
        .collect()
}

/// Whether the comma-separated `expands` parameter names `field`.
pub(crate) fn expands(raw: Option<&str>, field: &str) -> bool {
    raw.unwrap_or_default()
        .split(',')
        .any(|item| item.trim() == field)
}

/// Rejects blank required text fields.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}
