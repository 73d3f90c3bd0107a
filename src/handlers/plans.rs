use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{Created, authorize_api, created, parse_list, require_text};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    extract::{Json, Path, Query},
    handlers::subscriptions::close_subscription,
    links::{RequestUri, build_links},
    models::{
        CreatePlan, Plan, PlanMode, PlanResponse, PlanSecurityType, PlanStatus, PlanValidation,
        PlansResponse, Subscription, SubscriptionStatus, UpdatePlan,
    },
    pagination::{PaginationParam, paginate},
    permission::{RolePermission, RolePermissionAction},
    repository::{Repository, SubscriptionQuery},
};

/// PlanSearchParams
///
/// Query parameters of `GET /plans`. List values are comma-separated.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlanSearchParams {
    /// Defaults to `PUBLISHED`.
    pub statuses: Option<String>,
    pub securities: Option<String>,
    pub mode: Option<PlanMode>,
}

async fn load_plan(repo: &dyn Repository, api_id: Uuid, plan_id: Uuid) -> Result<Plan, ApiError> {
    repo.find_plan(plan_id)
        .await?
        .filter(|plan| plan.api_id == api_id)
        .ok_or_else(|| ApiError::not_found("Plan", plan_id))
}

async fn active_subscriptions(
    repo: &dyn Repository,
    api_id: Uuid,
    plan_id: Uuid,
) -> Result<Vec<Subscription>, ApiError> {
    let query = SubscriptionQuery {
        plan_ids: vec![plan_id],
        statuses: SubscriptionStatus::ACTIVE.to_vec(),
        ..SubscriptionQuery::for_api(api_id)
    };
    Ok(repo.search_subscriptions(&query).await?)
}

/// list_plans
///
/// Lists the plans of an API sorted by `order`.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/plans",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), PlanSearchParams, PaginationParam),
    responses(
        (status = 200, description = "Page of plans", body = PlansResponse),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn list_plans(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
    Query(params): Query<PlanSearchParams>,
) -> Result<Json<PlansResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiPlan,
        RolePermissionAction::Read,
    )
    .await?;

    let mut statuses: Vec<PlanStatus> = parse_list(params.statuses.as_deref(), "statuses")?;
    if statuses.is_empty() {
        statuses.push(PlanStatus::Published);
    }
    let securities: Vec<PlanSecurityType> = parse_list(params.securities.as_deref(), "securities")?;

    let plans: Vec<Plan> = state
        .repo
        .find_plans_by_api(api_id)
        .await?
        .into_iter()
        .filter(|plan| statuses.contains(&plan.status))
        .filter(|plan| {
            securities.is_empty() || plan.security.is_some_and(|s| securities.contains(&s))
        })
        .filter(|plan| params.mode.is_none_or(|mode| plan.mode == mode))
        .collect();

    let (page, window) = paginate(plans, &pagination)?;
    Ok(Json(PlansResponse {
        data: page.into_iter().map(PlanResponse::from).collect(),
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}

/// create_plan
///
/// Creates a `STAGING` plan placed after the existing ones. `STANDARD` plans
/// need a security type; `PUSH` plans must not have one.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/plans",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    request_body = CreatePlan,
    responses(
        (status = 201, description = "Plan created", body = PlanResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn create_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Json(payload): Json<CreatePlan>,
) -> Result<Created<PlanResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiPlan,
        RolePermissionAction::Create,
    )
    .await?;

    require_text(&payload.name, "name")?;
    let mode = payload.mode.unwrap_or(PlanMode::Standard);
    match (mode, payload.security) {
        (PlanMode::Standard, None) => {
            return Err(ApiError::validation("A STANDARD plan requires a security type"));
        }
        (PlanMode::Push, Some(_)) => {
            return Err(ApiError::validation("A PUSH plan cannot have a security type"));
        }
        _ => {}
    }

    let existing = state.repo.find_plans_by_api(api_id).await?;
    let order = existing.iter().map(|p| p.order).max().unwrap_or(0) + 1;

    let now = Utc::now();
    let plan = Plan {
        id: Uuid::new_v4(),
        api_id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        status: PlanStatus::Staging,
        security: payload.security,
        mode,
        validation: payload.validation.unwrap_or(PlanValidation::Manual),
        characteristics: payload.characteristics,
        order,
        created_at: now,
        updated_at: now,
        published_at: None,
        closed_at: None,
    };

    let plan = state.repo.create_plan(plan).await?;
    tracing::info!(%api_id, plan_id = %plan.id, "plan created");
    Ok(created(uri.child(plan.id), PlanResponse::from(plan)))
}

/// get_plan
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/plans/{planId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("planId" = Uuid, Path)),
    responses(
        (status = 200, description = "The plan", body = PlanResponse),
        (status = 404, description = "Unknown plan", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn get_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, plan_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<PlanResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiPlan,
        RolePermissionAction::Read,
    )
    .await?;

    let plan = load_plan(state.repo.as_ref(), api_id, plan_id).await?;
    Ok(Json(PlanResponse::from(plan)))
}

/// update_plan
#[utoipa::path(
    put,
    path = "/environments/{envId}/apis/{apiId}/plans/{planId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("planId" = Uuid, Path)),
    request_body = UpdatePlan,
    responses(
        (status = 200, description = "Plan updated", body = PlanResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 404, description = "Unknown plan", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn update_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, plan_id)): Path<(String, Uuid, Uuid)>,
    Json(payload): Json<UpdatePlan>,
) -> Result<Json<PlanResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiPlan,
        RolePermissionAction::Update,
    )
    .await?;

    let mut plan = load_plan(state.repo.as_ref(), api_id, plan_id).await?;
    if plan.status == PlanStatus::Closed {
        return Err(ApiError::bad_request(
            "plan.closed",
            format!("Plan [{plan_id}] is already closed"),
        ));
    }

    if let Some(name) = payload.name {
        require_text(&name, "name")?;
        plan.name = name.trim().to_string();
    }
    if payload.description.is_some() {
        plan.description = payload.description;
    }
    if let Some(validation) = payload.validation {
        plan.validation = validation;
    }
    if let Some(characteristics) = payload.characteristics {
        plan.characteristics = characteristics;
    }
    if let Some(order) = payload.order {
        if order < 1 {
            return Err(ApiError::validation("order must be greater than 0"));
        }
        plan.order = order;
    }
    plan.updated_at = Utc::now();

    let plan = state.repo.update_plan(&plan).await?;
    Ok(Json(PlanResponse::from(plan)))
}

/// delete_plan
///
/// Refused while the plan still has pending, accepted or paused subscriptions.
#[utoipa::path(
    delete,
    path = "/environments/{envId}/apis/{apiId}/plans/{planId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("planId" = Uuid, Path)),
    responses(
        (status = 204, description = "Plan deleted"),
        (status = 400, description = "Plan has active subscriptions", body = ErrorBody),
        (status = 404, description = "Unknown plan", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn delete_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, plan_id)): Path<(String, Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiPlan,
        RolePermissionAction::Delete,
    )
    .await?;

    let repo = state.repo.as_ref();
    load_plan(repo, api_id, plan_id).await?;

    if !active_subscriptions(repo, api_id, plan_id).await?.is_empty() {
        return Err(ApiError::bad_request(
            "plan.activeSubscriptions",
            format!("Plan [{plan_id}] still has active subscriptions"),
        ));
    }

    repo.delete_plan(plan_id).await?;
    tracing::info!(%api_id, %plan_id, "plan deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Copy)]
enum PlanTransition {
    Publish,
    Deprecate,
    Close,
}

fn apply_transition(plan: &mut Plan, transition: PlanTransition) -> Result<(), ApiError> {
    let id = plan.id;
    let rejected = |message: String| -> Result<(), ApiError> {
        Err(ApiError::bad_request("plan.invalidStatus", message))
    };
    let now = Utc::now();

    if plan.status == PlanStatus::Closed {
        return rejected(format!("Plan [{id}] is already closed"));
    }

    match (transition, plan.status) {
        (PlanTransition::Publish, PlanStatus::Staging) => {
            plan.status = PlanStatus::Published;
            plan.published_at = Some(now);
        }
        (PlanTransition::Publish, PlanStatus::Published) => {
            return rejected(format!("Plan [{id}] is already published"));
        }
        (PlanTransition::Publish, _) => {
            return rejected(format!("Plan [{id}] is deprecated and cannot be published"));
        }
        (PlanTransition::Deprecate, PlanStatus::Published) => {
            plan.status = PlanStatus::Deprecated;
        }
        (PlanTransition::Deprecate, PlanStatus::Deprecated) => {
            return rejected(format!("Plan [{id}] is already deprecated"));
        }
        (PlanTransition::Deprecate, _) => {
            return rejected(format!("Plan [{id}] is not published"));
        }
        (PlanTransition::Close, _) => {
            plan.status = PlanStatus::Closed;
            plan.closed_at = Some(now);
        }
    }
    plan.updated_at = now;
    Ok(())
}

async fn transition_plan(
    state: &AppState,
    user: &AuthUser,
    env_id: &str,
    api_id: Uuid,
    plan_id: Uuid,
    transition: PlanTransition,
) -> Result<Json<PlanResponse>, ApiError> {
    authorize_api(
        state,
        user,
        env_id,
        api_id,
        RolePermission::ApiPlan,
        RolePermissionAction::Update,
    )
    .await?;

    let repo = state.repo.as_ref();
    let mut plan = load_plan(repo, api_id, plan_id).await?;
    apply_transition(&mut plan, transition)?;

    let plan = match transition {
        PlanTransition::Close => {
            let mut closed = Vec::new();
            for mut subscription in active_subscriptions(repo, api_id, plan_id).await? {
                close_subscription(&mut subscription, user.id)?;
                closed.push(subscription);
            }
            repo.close_plan(&plan, &closed).await?
        }
        PlanTransition::Publish | PlanTransition::Deprecate => repo.update_plan(&plan).await?,
    };
    tracing::info!(%api_id, %plan_id, status = %plan.status, "plan status changed");
    Ok(Json(PlanResponse::from(plan)))
}

/// publish_plan
///
/// `STAGING` to `PUBLISHED`.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/plans/{planId}/_publish",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("planId" = Uuid, Path)),
    responses(
        (status = 200, description = "Plan published", body = PlanResponse),
        (status = 400, description = "Invalid transition", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn publish_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, plan_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<PlanResponse>, ApiError> {
    transition_plan(&state, &user, &env_id, api_id, plan_id, PlanTransition::Publish).await
}

/// deprecate_plan
///
/// `PUBLISHED` to `DEPRECATED`. Existing subscriptions keep working.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/plans/{planId}/_deprecate",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("planId" = Uuid, Path)),
    responses(
        (status = 200, description = "Plan deprecated", body = PlanResponse),
        (status = 400, description = "Invalid transition", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn deprecate_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, plan_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<PlanResponse>, ApiError> {
    transition_plan(&state, &user, &env_id, api_id, plan_id, PlanTransition::Deprecate).await
}

/// close_plan
///
/// Closes the plan and every active subscription on it.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/plans/{planId}/_close",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("planId" = Uuid, Path)),
    responses(
        (status = 200, description = "Plan closed", body = PlanResponse),
        (status = 400, description = "Already closed", body = ErrorBody)
    ),
    tag = "plans"
)]
pub async fn close_plan(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, plan_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<PlanResponse>, ApiError> {
    transition_plan(&state, &user, &env_id, api_id, plan_id, PlanTransition::Close).await
}
