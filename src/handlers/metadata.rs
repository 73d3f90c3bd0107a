use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use super::{Created, authorize_api, created, require_text};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    extract::{Json, Path, Query},
    links::{RequestUri, build_links},
    models::{
        CreateMetadata, Metadata, MetadataEntry, MetadataFormat, MetadataResponse, UpdateMetadata,
        slugify,
    },
    pagination::{PaginationParam, paginate},
    permission::{RolePermission, RolePermissionAction},
    repository::Repository,
};

async fn load_metadata(
    repo: &dyn Repository,
    api_id: Uuid,
    key: &str,
) -> Result<Metadata, ApiError> {
    repo.find_metadata(api_id, key)
        .await?
        .ok_or_else(|| ApiError::not_found("Metadata", key))
}

/// list_metadata
///
/// Lists the metadata of an API, sorted by name.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/metadata",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), PaginationParam),
    responses(
        (status = 200, description = "Page of metadata", body = MetadataResponse),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    tag = "metadata"
)]
pub async fn list_metadata(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
) -> Result<Json<MetadataResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMetadata,
        RolePermissionAction::Read,
    )
    .await?;

    let metadata = state.repo.find_metadata_by_api(api_id).await?;
    let (page, window) = paginate(metadata, &pagination)?;

    Ok(Json(MetadataResponse {
        data: page.into_iter().map(MetadataEntry::from).collect(),
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}

/// create_metadata
///
/// The key is derived from the name. `format` defaults to `STRING`.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/metadata",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    request_body = CreateMetadata,
    responses(
        (status = 201, description = "Metadata created", body = MetadataEntry),
        (status = 400, description = "Duplicate key or invalid value", body = ErrorBody)
    ),
    tag = "metadata"
)]
pub async fn create_metadata(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Json(payload): Json<CreateMetadata>,
) -> Result<Created<MetadataEntry>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMetadata,
        RolePermissionAction::Create,
    )
    .await?;

    require_text(&payload.name, "name")?;
    let key = slugify(&payload.name);
    if key.is_empty() {
        return Err(ApiError::validation(format!(
            "Invalid metadata name [{}]",
            payload.name
        )));
    }

    let format = payload.format.unwrap_or(MetadataFormat::String);
    format.validate(&payload.value).map_err(ApiError::validation)?;

    let repo = state.repo.as_ref();
    if repo.find_metadata(api_id, &key).await?.is_some() {
        return Err(ApiError::bad_request(
            "metadata.duplicated",
            format!("Metadata [{key}] already exists for api [{api_id}]"),
        ));
    }

    let now = Utc::now();
    let metadata = repo
        .create_metadata(Metadata {
            api_id,
            key,
            name: payload.name.trim().to_string(),
            value: payload.value,
            format,
            created_at: now,
            updated_at: now,
        })
        .await?;
    tracing::debug!(%api_id, key = %metadata.key, "metadata created");

    let location = uri.child(&metadata.key);
    Ok(created(location, MetadataEntry::from(metadata)))
}

/// get_metadata
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/metadata/{key}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("key" = String, Path)),
    responses(
        (status = 200, description = "The metadata", body = MetadataEntry),
        (status = 404, description = "Unknown key", body = ErrorBody)
    ),
    tag = "metadata"
)]
pub async fn get_metadata(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, key)): Path<(String, Uuid, String)>,
) -> Result<Json<MetadataEntry>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMetadata,
        RolePermissionAction::Read,
    )
    .await?;

    let metadata = load_metadata(state.repo.as_ref(), api_id, &key).await?;
    Ok(Json(MetadataEntry::from(metadata)))
}

/// update_metadata
///
/// Partial update. The value is checked against the resulting format.
#[utoipa::path(
    put,
    path = "/environments/{envId}/apis/{apiId}/metadata/{key}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("key" = String, Path)),
    request_body = UpdateMetadata,
    responses(
        (status = 200, description = "Metadata updated", body = MetadataEntry),
        (status = 400, description = "Invalid value", body = ErrorBody),
        (status = 404, description = "Unknown key", body = ErrorBody)
    ),
    tag = "metadata"
)]
pub async fn update_metadata(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, key)): Path<(String, Uuid, String)>,
    Json(payload): Json<UpdateMetadata>,
) -> Result<Json<MetadataEntry>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMetadata,
        RolePermissionAction::Update,
    )
    .await?;

    let repo = state.repo.as_ref();
    let mut metadata = load_metadata(repo, api_id, &key).await?;

    if let Some(name) = payload.name {
        require_text(&name, "name")?;
        metadata.name = name.trim().to_string();
    }
    if let Some(value) = payload.value {
        metadata.value = value;
    }
    if let Some(format) = payload.format {
        metadata.format = format;
    }
    metadata
        .format
        .validate(&metadata.value)
        .map_err(ApiError::validation)?;
    metadata.updated_at = Utc::now();

    let metadata = repo.update_metadata(&metadata).await?;
    Ok(Json(MetadataEntry::from(metadata)))
}

/// delete_metadata
#[utoipa::path(
    delete,
    path = "/environments/{envId}/apis/{apiId}/metadata/{key}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("key" = String, Path)),
    responses(
        (status = 204, description = "Metadata deleted"),
        (status = 404, description = "Unknown key", body = ErrorBody)
    ),
    tag = "metadata"
)]
pub async fn delete_metadata(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, key)): Path<(String, Uuid, String)>,
) -> Result<StatusCode, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMetadata,
        RolePermissionAction::Delete,
    )
    .await?;

    if !state.repo.delete_metadata(api_id, &key).await? {
        return Err(ApiError::not_found("Metadata", key));
    }
    Ok(StatusCode::NO_CONTENT)
}
