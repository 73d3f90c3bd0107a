use std::collections::HashMap;

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use super::{Created, authorize_api, created, load_api};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody, RepositoryError},
    extract::{Json, Path, Query},
    links::{RequestUri, build_links},
    models::{
        API_OWNER, AddMember, MemberPermissions, MemberResponse, MembersResponse, Membership,
        PRIMARY_OWNER, RoleScope, TransferOwnership, UpdateMember, User,
    },
    pagination::{PaginationParam, paginate},
    permission::{ExecutionContext, RolePermission, RolePermissionAction, effective_permissions},
    repository::Repository,
};

fn single_primary_owner() -> ApiError {
    ApiError::bad_request(
        "member.primaryOwner",
        "An API must always have only one PRIMARY_OWNER !".to_string(),
    )
}

async fn find_user(repo: &dyn Repository, user_id: Uuid) -> Result<User, ApiError> {
    repo.find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

/// Only API-scope roles can be granted on an API.
async fn require_role(repo: &dyn Repository, role_name: &str) -> Result<(), ApiError> {
    match repo.find_role(RoleScope::Api, role_name).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("Role", role_name)),
    }
}

async fn load_membership(
    repo: &dyn Repository,
    api_id: Uuid,
    member_id: Uuid,
) -> Result<Membership, ApiError> {
    repo.find_membership(api_id, member_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member", member_id))
}

/// list_members
///
/// Lists the members of an API, sorted by display name.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/members",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), PaginationParam),
    responses(
        (status = 200, description = "Page of members", body = MembersResponse),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "members"
)]
pub async fn list_members(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
) -> Result<Json<MembersResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMember,
        RolePermissionAction::Read,
    )
    .await?;

    let repo = state.repo.as_ref();
    let memberships = repo.find_memberships_by_api(api_id).await?;
    let ids: Vec<Uuid> = memberships.iter().map(|m| m.user_id).collect();
    let mut users: HashMap<Uuid, User> = repo
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let mut members: Vec<MemberResponse> = memberships
        .iter()
        .filter_map(|membership| {
            users
                .remove(&membership.user_id)
                .map(|user| MemberResponse::new(user, membership))
        })
        .collect();
    members.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });

    let (data, window) = paginate(members, &pagination)?;
    Ok(Json(MembersResponse {
        data,
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}

/// add_member
///
/// Grants an API role to a user. The primary owner role is only obtained via
/// ownership transfer.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/members",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    request_body = AddMember,
    responses(
        (status = 201, description = "Member added", body = MemberResponse),
        (status = 400, description = "Primary owner role or already a member", body = ErrorBody),
        (status = 404, description = "Unknown user or role", body = ErrorBody)
    ),
    tag = "members"
)]
pub async fn add_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Json(payload): Json<AddMember>,
) -> Result<Created<MemberResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMember,
        RolePermissionAction::Create,
    )
    .await?;

    let repo = state.repo.as_ref();
    let member = find_user(repo, payload.user_id).await?;
    if payload.role_name == PRIMARY_OWNER {
        return Err(single_primary_owner());
    }
    require_role(repo, &payload.role_name).await?;

    if repo.find_membership(api_id, member.id).await?.is_some() {
        return Err(ApiError::bad_request(
            "member.alreadyExists",
            format!("User [{}] is already a member of api [{api_id}]", member.id),
        ));
    }

    let membership = Membership {
        api_id,
        user_id: member.id,
        role_name: payload.role_name,
        created_at: Utc::now(),
    };
    repo.save_membership(&membership).await?;
    tracing::info!(%api_id, member_id = %member.id, role = %membership.role_name, "member added");

    let location = uri.child(member.id);
    Ok(created(location, MemberResponse::new(member, &membership)))
}

/// update_member
#[utoipa::path(
    put,
    path = "/environments/{envId}/apis/{apiId}/members/{memberId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("memberId" = Uuid, Path)),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 400, description = "Primary owner change", body = ErrorBody),
        (status = 404, description = "Unknown member or role", body = ErrorBody)
    ),
    tag = "members"
)]
pub async fn update_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, member_id)): Path<(String, Uuid, Uuid)>,
    Json(payload): Json<UpdateMember>,
) -> Result<Json<MemberResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMember,
        RolePermissionAction::Update,
    )
    .await?;

    let repo = state.repo.as_ref();
    let mut membership = load_membership(repo, api_id, member_id).await?;
    if payload.role_name == PRIMARY_OWNER || membership.role_name == PRIMARY_OWNER {
        return Err(single_primary_owner());
    }
    require_role(repo, &payload.role_name).await?;

    membership.role_name = payload.role_name;
    repo.save_membership(&membership).await?;

    let member = find_user(repo, member_id).await?;
    Ok(Json(MemberResponse::new(member, &membership)))
}

/// delete_member
#[utoipa::path(
    delete,
    path = "/environments/{envId}/apis/{apiId}/members/{memberId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("memberId" = Uuid, Path)),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "Primary owner", body = ErrorBody),
        (status = 404, description = "Unknown member", body = ErrorBody)
    ),
    tag = "members"
)]
pub async fn delete_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, member_id)): Path<(String, Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMember,
        RolePermissionAction::Delete,
    )
    .await?;

    let repo = state.repo.as_ref();
    let membership = load_membership(repo, api_id, member_id).await?;
    if membership.role_name == PRIMARY_OWNER {
        return Err(single_primary_owner());
    }

    repo.delete_membership(api_id, member_id).await?;
    tracing::info!(%api_id, %member_id, "member removed");
    Ok(StatusCode::NO_CONTENT)
}

/// transfer_ownership
///
/// Makes `userId` the primary owner. The previous owner keeps `poRole`.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/members/_transfer-ownership",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    request_body = TransferOwnership,
    responses(
        (status = 204, description = "Ownership transferred"),
        (status = 400, description = "Invalid role", body = ErrorBody),
        (status = 404, description = "Unknown user or role", body = ErrorBody)
    ),
    tag = "members"
)]
pub async fn transfer_ownership(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    Json(payload): Json<TransferOwnership>,
) -> Result<StatusCode, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiMember,
        RolePermissionAction::Update,
    )
    .await?;

    let repo = state.repo.as_ref();
    let new_owner = find_user(repo, payload.user_id).await?;
    let po_role = payload.po_role.unwrap_or_else(|| API_OWNER.to_string());
    if po_role == PRIMARY_OWNER {
        return Err(single_primary_owner());
    }
    require_role(repo, &po_role).await?;

    let current = repo
        .find_memberships_by_api(api_id)
        .await?
        .into_iter()
        .find(|m| m.role_name == PRIMARY_OWNER)
        .ok_or(ApiError::Repository(RepositoryError::Missing {
            entity: "primary owner",
            id: api_id.to_string(),
        }))?;
    if current.user_id == new_owner.id {
        return Err(ApiError::bad_request(
            "member.alreadyPrimaryOwner",
            format!("User [{}] is already the primary owner", new_owner.id),
        ));
    }

    repo.transfer_ownership(api_id, current.user_id, new_owner.id, &po_role)
        .await?;
    tracing::info!(
        %api_id,
        previous_owner = %current.user_id,
        new_owner = %new_owner.id,
        "api ownership transferred"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// get_member_permissions
///
/// The caller's own permissions on the API, e.g. `{"PLAN": "CRUD"}`. Needs no
/// particular permission.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/members/permissions",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    responses(
        (status = 200, description = "Permission map", body = std::collections::BTreeMap<String, String>),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "members"
)]
pub async fn get_member_permissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
) -> Result<Json<MemberPermissions>, ApiError> {
    let repo = state.repo.as_ref();
    let ctx = ExecutionContext::resolve(repo, &env_id).await?;
    load_api(repo, &ctx, api_id).await?;
    Ok(Json(effective_permissions(repo, &user, api_id).await?))
}
