use axum::extract::State;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    extract::Json,
    models::UserProfile,
};

/// get_current_user
///
/// Profile of the authenticated caller.
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Current user profile", body = UserProfile),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "user"
)]
pub async fn get_current_user(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state
        .repo
        .find_user(user.id)
        .await?
        .map(UserProfile::from)
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(profile))
}
