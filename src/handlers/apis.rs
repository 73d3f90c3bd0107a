use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{Created, authorize_api, created, expands, require_text};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    extract::{Json, Path, Query},
    links::{RequestUri, build_links},
    models::{
        Api, ApiLifecycleState, ApiResponse, ApiState, ApisResponse, CreateApi, DefinitionVersion,
        ENVIRONMENT_ADMIN, Membership, PRIMARY_OWNER, PrimaryOwner, UpdateApi, Visibility,
    },
    pagination::{PaginationParam, paginate},
    permission::{ExecutionContext, RolePermission, RolePermissionAction, require_permission},
    repository::{ApiQuery, Repository},
};

/// ApiSearchParams
///
/// Query parameters of `GET /apis`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApiSearchParams {
    /// Case-insensitive filter on the API name.
    pub q: Option<String>,
    /// `primaryOwner` adds each API's primary owner.
    pub expands: Option<String>,
}

async fn primary_owner(
    repo: &dyn Repository,
    api_id: Uuid,
) -> Result<Option<PrimaryOwner>, ApiError> {
    let memberships = repo.find_memberships_by_api(api_id).await?;
    let Some(owner) = memberships.iter().find(|m| m.role_name == PRIMARY_OWNER) else {
        return Ok(None);
    };
    Ok(repo.find_user(owner.user_id).await?.map(PrimaryOwner::from))
}

/// list_apis
///
/// Lists the APIs of the environment the caller can see, sorted by name.
/// Environment admins see all of them; other users see the APIs they are a member of.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis",
    params(("envId" = String, Path), ApiSearchParams, PaginationParam),
    responses(
        (status = 200, description = "Page of APIs", body = ApisResponse),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown environment", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn list_apis(
    user: AuthUser,
    State(state): State<AppState>,
    Path(env_id): Path<String>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
    Query(params): Query<ApiSearchParams>,
) -> Result<Json<ApisResponse>, ApiError> {
    let repo = state.repo.as_ref();
    let ctx = ExecutionContext::resolve(repo, &env_id).await?;
    require_permission(
        repo,
        &ctx,
        &user,
        RolePermission::EnvironmentApi,
        &ctx.environment_id,
        RolePermissionAction::Read,
    )
    .await?;

    let ids = if user.role == ENVIRONMENT_ADMIN {
        None
    } else {
        Some(repo.find_api_ids_by_member(user.id).await?)
    };
    let query = ApiQuery {
        name: params.q.filter(|q| !q.trim().is_empty()),
        ids,
    };

    let apis = repo.search_apis(&ctx.environment_id, &query).await?;
    let (page, window) = paginate(apis, &pagination)?;

    let with_owner = expands(params.expands.as_deref(), "primaryOwner");
    let mut data = Vec::with_capacity(page.len());
    for api in page {
        let api_id = api.id;
        let mut response = ApiResponse::from(api);
        if with_owner {
            response.primary_owner = primary_owner(repo, api_id).await?;
        }
        data.push(response);
    }

    Ok(Json(ApisResponse {
        data,
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}

/// create_api
///
/// Creates a stopped API. The caller becomes its primary owner.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis",
    params(("envId" = String, Path)),
    request_body = CreateApi,
    responses(
        (status = 201, description = "API created", body = ApiResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn create_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path(env_id): Path<String>,
    uri: RequestUri,
    Json(payload): Json<CreateApi>,
) -> Result<Created<ApiResponse>, ApiError> {
    let repo = state.repo.as_ref();
    let ctx = ExecutionContext::resolve(repo, &env_id).await?;
    require_permission(
        repo,
        &ctx,
        &user,
        RolePermission::EnvironmentApi,
        &ctx.environment_id,
        RolePermissionAction::Create,
    )
    .await?;

    require_text(&payload.name, "name")?;
    require_text(&payload.api_version, "apiVersion")?;

    let now = Utc::now();
    let api = Api {
        id: Uuid::new_v4(),
        environment_id: ctx.environment_id.clone(),
        name: payload.name.trim().to_string(),
        api_version: payload.api_version.trim().to_string(),
        description: payload.description,
        definition_version: payload.definition_version.unwrap_or(DefinitionVersion::V4),
        state: ApiState::Stopped,
        lifecycle_state: ApiLifecycleState::Created,
        visibility: payload.visibility.unwrap_or(Visibility::Private),
        created_at: now,
        updated_at: now,
    };
    let owner = Membership {
        api_id: api.id,
        user_id: user.id,
        role_name: PRIMARY_OWNER.to_string(),
        created_at: now,
    };

    let api = repo.create_api(api, owner).await?;
    tracing::info!(api_id = %api.id, user_id = %user.id, "api created");

    let location = uri.child(api.id);
    let mut response = ApiResponse::from(api);
    response.primary_owner = repo.find_user(user.id).await?.map(PrimaryOwner::from);
    Ok(created(location, response))
}

/// get_api
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    responses(
        (status = 200, description = "The API", body = ApiResponse),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn get_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse>, ApiError> {
    let (_, api) = authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiDefinition,
        RolePermissionAction::Read,
    )
    .await?;

    let mut response = ApiResponse::from(api);
    response.primary_owner = primary_owner(state.repo.as_ref(), api_id).await?;
    Ok(Json(response))
}

/// update_api
///
/// Partial update: absent fields keep their current value.
#[utoipa::path(
    put,
    path = "/environments/{envId}/apis/{apiId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    request_body = UpdateApi,
    responses(
        (status = 200, description = "API updated", body = ApiResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn update_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateApi>,
) -> Result<Json<ApiResponse>, ApiError> {
    let (_, mut api) = authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiDefinition,
        RolePermissionAction::Update,
    )
    .await?;

    if let Some(name) = payload.name {
        require_text(&name, "name")?;
        api.name = name.trim().to_string();
    }
    if let Some(api_version) = payload.api_version {
        require_text(&api_version, "apiVersion")?;
        api.api_version = api_version.trim().to_string();
    }
    if payload.description.is_some() {
        api.description = payload.description;
    }
    if let Some(visibility) = payload.visibility {
        api.visibility = visibility;
    }
    if let Some(lifecycle_state) = payload.lifecycle_state {
        api.lifecycle_state = lifecycle_state;
    }
    api.updated_at = Utc::now();

    let api = state.repo.update_api(&api).await?;
    let mut response = ApiResponse::from(api);
    response.primary_owner = primary_owner(state.repo.as_ref(), api_id).await?;
    Ok(Json(response))
}

/// delete_api
///
/// Deletes a stopped API with its plans, subscriptions, members and metadata.
#[utoipa::path(
    delete,
    path = "/environments/{envId}/apis/{apiId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    responses(
        (status = 204, description = "API deleted"),
        (status = 400, description = "API still running", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn delete_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let (_, api) = authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiDefinition,
        RolePermissionAction::Delete,
    )
    .await?;

    if api.state == ApiState::Started {
        return Err(ApiError::bad_request(
            "api.running",
            format!("Api [{api_id}] is still running"),
        ));
    }

    state.repo.delete_api(api_id).await?;
    tracing::info!(%api_id, user_id = %user.id, "api deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn change_state(
    state: &AppState,
    user: &AuthUser,
    env_id: &str,
    api_id: Uuid,
    target: ApiState,
) -> Result<Json<ApiResponse>, ApiError> {
    let (_, mut api) = authorize_api(
        state,
        user,
        env_id,
        api_id,
        RolePermission::ApiDefinition,
        RolePermissionAction::Update,
    )
    .await?;

    if api.state == target {
        let status = match target {
            ApiState::Started => "started",
            ApiState::Stopped => "stopped",
        };
        return Err(ApiError::bad_request(
            "api.invalidState",
            format!("Api [{api_id}] is already {status}"),
        ));
    }

    api.state = target;
    api.updated_at = Utc::now();
    let api = state.repo.update_api(&api).await?;
    tracing::info!(%api_id, state = %api.state, "api state changed");
    Ok(Json(ApiResponse::from(api)))
}

/// start_api
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/_start",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    responses(
        (status = 200, description = "API started", body = ApiResponse),
        (status = 400, description = "Already started", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn start_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse>, ApiError> {
    change_state(&state, &user, &env_id, api_id, ApiState::Started).await
}

/// stop_api
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/_stop",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    responses(
        (status = 200, description = "API stopped", body = ApiResponse),
        (status = 400, description = "Already stopped", body = ErrorBody)
    ),
    tag = "apis"
)]
pub async fn stop_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse>, ApiError> {
    change_state(&state, &user, &env_id, api_id, ApiState::Stopped).await
}
