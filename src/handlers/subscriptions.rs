use std::collections::HashMap;

use axum::{extract::State, http::header, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{Created, authorize_api, created, expands, parse_list};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    extract::{Json, Path, Query},
    links::{RequestUri, build_links},
    models::{
        AcceptSubscription, Application, BaseApplication, BasePlan, CreateSubscription,
        PlanValidation, RejectSubscription, Subscription, SubscriptionResponse, SubscriptionStatus,
        SubscriptionsResponse, UpdateSubscription,
    },
    pagination::{PaginationParam, paginate},
    permission::{ExecutionContext, RolePermission, RolePermissionAction},
    repository::{Repository, SubscriptionQuery},
};

/// SubscriptionSearchParams
///
/// Query parameters shared by the list and export endpoints. List values are
/// comma-separated.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct SubscriptionSearchParams {
    pub application_ids: Option<String>,
    pub plan_ids: Option<String>,
    /// Defaults to `ACCEPTED`.
    pub statuses: Option<String>,
    /// `plan` and/or `application`.
    pub expands: Option<String>,
}

impl SubscriptionSearchParams {
    fn to_query(&self, api_id: Uuid) -> Result<SubscriptionQuery, ApiError> {
        let mut statuses: Vec<SubscriptionStatus> =
            parse_list(self.statuses.as_deref(), "statuses")?;
        if statuses.is_empty() {
            statuses.push(SubscriptionStatus::Accepted);
        }
        Ok(SubscriptionQuery {
            api_id,
            application_ids: parse_list(self.application_ids.as_deref(), "applicationIds")?,
            plan_ids: parse_list(self.plan_ids.as_deref(), "planIds")?,
            statuses,
        })
    }
}

async fn load_subscription(
    repo: &dyn Repository,
    api_id: Uuid,
    subscription_id: Uuid,
) -> Result<Subscription, ApiError> {
    repo.find_subscription(subscription_id)
        .await?
        .filter(|subscription| subscription.api_id == api_id)
        .ok_or_else(|| ApiError::not_found("Subscription", subscription_id))
}

fn invalid_status(subscription: &Subscription, action: &str) -> ApiError {
    ApiError::bad_request(
        "subscription.invalidStatus",
        format!(
            "Subscription [{}] cannot be {action}: status is {}",
            subscription.id, subscription.status
        ),
    )
}

fn check_period(
    starting_at: Option<DateTime<Utc>>,
    ending_at: Option<DateTime<Utc>>,
) -> Result<(), ApiError> {
    match (starting_at, ending_at) {
        (Some(start), Some(end)) if end <= start => {
            Err(ApiError::validation("endingAt must be after startingAt"))
        }
        _ => Ok(()),
    }
}

/// close_subscription
///
/// A pending subscription is rejected; an accepted or paused one is closed.
pub(crate) fn close_subscription(
    subscription: &mut Subscription,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let now = Utc::now();
    match subscription.status {
        SubscriptionStatus::Pending => {
            subscription.status = SubscriptionStatus::Rejected;
            subscription.processed_at = Some(now);
            subscription.processed_by = Some(user_id);
        }
        SubscriptionStatus::Accepted | SubscriptionStatus::Paused => {
            subscription.status = SubscriptionStatus::Closed;
            subscription.closed_at = Some(now);
            subscription.paused_at = None;
        }
        SubscriptionStatus::Rejected | SubscriptionStatus::Closed => {
            return Err(invalid_status(subscription, "closed"));
        }
    }
    subscription.updated_at = now;
    Ok(())
}

/// Maps subscriptions to their REST view, embedding plans and applications on demand.
async fn to_responses(
    repo: &dyn Repository,
    subscriptions: Vec<Subscription>,
    with_plan: bool,
    with_application: bool,
) -> Result<Vec<SubscriptionResponse>, ApiError> {
    let plans: HashMap<Uuid, BasePlan> = if with_plan {
        let ids: Vec<Uuid> = subscriptions.iter().map(|s| s.plan_id).collect();
        repo.find_plans(&ids)
            .await?
            .into_iter()
            .map(|plan| (plan.id, BasePlan::from(plan)))
            .collect()
    } else {
        HashMap::new()
    };
    let applications: HashMap<Uuid, BaseApplication> = if with_application {
        let ids: Vec<Uuid> = subscriptions.iter().map(|s| s.application_id).collect();
        repo.find_applications(&ids)
            .await?
            .into_iter()
            .map(|application| (application.id, BaseApplication::from(application)))
            .collect()
    } else {
        HashMap::new()
    };

    Ok(subscriptions
        .into_iter()
        .map(|subscription| {
            let plan = plans.get(&subscription.plan_id).cloned();
            let application = applications.get(&subscription.application_id).cloned();
            let mut response = SubscriptionResponse::from(subscription);
            if let Some(plan) = plan {
                response.plan = plan;
            }
            if let Some(application) = application {
                response.application = application;
            }
            response
        })
        .collect())
}

/// list_subscriptions
///
/// Lists the subscriptions of an API, newest first.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/subscriptions",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), SubscriptionSearchParams, PaginationParam),
    responses(
        (status = 200, description = "Page of subscriptions", body = SubscriptionsResponse),
        (status = 400, description = "Invalid filter", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn list_subscriptions(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
    Query(params): Query<SubscriptionSearchParams>,
) -> Result<Json<SubscriptionsResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiSubscription,
        RolePermissionAction::Read,
    )
    .await?;

    let repo = state.repo.as_ref();
    let query = params.to_query(api_id)?;
    let subscriptions = repo.search_subscriptions(&query).await?;
    let (page, window) = paginate(subscriptions, &pagination)?;

    let data = to_responses(
        repo,
        page,
        expands(params.expands.as_deref(), "plan"),
        expands(params.expands.as_deref(), "application"),
    )
    .await?;

    Ok(Json(SubscriptionsResponse {
        data,
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_date(value: Option<DateTime<Utc>>) -> String {
    value.map(|date| date.to_rfc3339()).unwrap_or_default()
}

/// export_subscriptions
///
/// The filtered subscriptions as a CSV attachment, one row per subscription.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/_export",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), SubscriptionSearchParams),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn export_subscriptions(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    Query(params): Query<SubscriptionSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiSubscription,
        RolePermissionAction::Read,
    )
    .await?;

    let repo = state.repo.as_ref();
    let query = params.to_query(api_id)?;
    let subscriptions = repo.search_subscriptions(&query).await?;
    let rows = to_responses(repo, subscriptions, true, true).await?;

    let mut csv = String::from(
        "Id,Status,Plan,Application,Created at,Processed at,Starting at,Ending at,Closed at\n",
    );
    for row in rows {
        let plan = row.plan.name.unwrap_or_else(|| row.plan.id.to_string());
        let application = row
            .application
            .name
            .unwrap_or_else(|| row.application.id.to_string());
        let line = [
            row.id.to_string(),
            row.status.to_string(),
            csv_field(&plan),
            csv_field(&application),
            row.created_at.to_rfc3339(),
            csv_date(row.processed_at),
            csv_date(row.starting_at),
            csv_date(row.ending_at),
            csv_date(row.closed_at),
        ];
        csv.push_str(&line.join(","));
        csv.push('\n');
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"subscriptions-{api_id}.csv\""),
            ),
        ],
        csv,
    ))
}

/// create_subscription
///
/// Subscribes an application to a published plan of the API. Plans with
/// `AUTO` validation accept the subscription immediately.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/subscriptions",
    params(("envId" = String, Path), ("apiId" = Uuid, Path)),
    request_body = CreateSubscription,
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionResponse),
        (status = 400, description = "Plan not subscribable or duplicate", body = ErrorBody),
        (status = 404, description = "Unknown plan or application", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn create_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Json(payload): Json<CreateSubscription>,
) -> Result<Created<SubscriptionResponse>, ApiError> {
    let (ctx, _) = authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiSubscription,
        RolePermissionAction::Create,
    )
    .await?;
    let repo = state.repo.as_ref();

    let plan = repo
        .find_plan(payload.plan_id)
        .await?
        .filter(|plan| plan.api_id == api_id)
        .ok_or_else(|| ApiError::not_found("Plan", payload.plan_id))?;

    if !plan.is_subscribable() {
        return Err(ApiError::bad_request(
            "plan.notSubscribable",
            format!("Plan [{}] cannot be subscribed", plan.id),
        ));
    }

    let application = find_application(repo, &ctx, payload.application_id).await?;

    let existing = SubscriptionQuery {
        application_ids: vec![application.id],
        plan_ids: vec![plan.id],
        statuses: SubscriptionStatus::ACTIVE.to_vec(),
        ..SubscriptionQuery::for_api(api_id)
    };
    if !repo.search_subscriptions(&existing).await?.is_empty() {
        return Err(ApiError::bad_request(
            "subscription.alreadyExists",
            format!(
                "An active subscription already exists for plan [{}] and application [{}]",
                plan.id, application.id
            ),
        ));
    }

    let now = Utc::now();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        api_id,
        plan_id: plan.id,
        application_id: application.id,
        status: SubscriptionStatus::Pending,
        request: payload.request,
        reason: None,
        subscribed_by: user.id,
        processed_by: None,
        starting_at: None,
        ending_at: None,
        processed_at: None,
        paused_at: None,
        closed_at: None,
        created_at: now,
        updated_at: now,
    };
    if plan.validation == PlanValidation::Auto {
        subscription.status = SubscriptionStatus::Accepted;
        subscription.processed_at = Some(now);
        subscription.processed_by = Some(user.id);
        subscription.starting_at = Some(now);
    }

    let subscription = repo.create_subscription(subscription).await?;
    tracing::info!(
        %api_id,
        subscription_id = %subscription.id,
        status = %subscription.status,
        "subscription created"
    );

    let location = uri.child(subscription.id);
    let mut response = SubscriptionResponse::from(subscription);
    response.plan = BasePlan::from(plan);
    response.application = BaseApplication::from(application);
    Ok(created(location, response))
}

async fn find_application(
    repo: &dyn Repository,
    ctx: &ExecutionContext,
    application_id: Uuid,
) -> Result<Application, ApiError> {
    repo.find_application(application_id)
        .await?
        .filter(|application| application.environment_id == ctx.environment_id)
        .ok_or_else(|| ApiError::not_found("Application", application_id))
}

/// get_subscription
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    responses(
        (status = 200, description = "The subscription", body = SubscriptionResponse),
        (status = 404, description = "Unknown subscription", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn get_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiSubscription,
        RolePermissionAction::Read,
    )
    .await?;

    let repo = state.repo.as_ref();
    let subscription = load_subscription(repo, api_id, subscription_id).await?;
    let mut responses = to_responses(repo, vec![subscription], true, true).await?;
    responses
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Subscription", subscription_id))
}

/// update_subscription
///
/// Changes the validity period of a subscription.
#[utoipa::path(
    put,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    request_body = UpdateSubscription,
    responses(
        (status = 200, description = "Subscription updated", body = SubscriptionResponse),
        (status = 400, description = "Invalid period", body = ErrorBody),
        (status = 404, description = "Unknown subscription", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn update_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
    Json(payload): Json<UpdateSubscription>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiSubscription,
        RolePermissionAction::Update,
    )
    .await?;

    let repo = state.repo.as_ref();
    let mut subscription = load_subscription(repo, api_id, subscription_id).await?;
    if !subscription.status.is_active() {
        return Err(invalid_status(&subscription, "updated"));
    }

    check_period(payload.starting_at, payload.ending_at)?;
    subscription.starting_at = payload.starting_at;
    subscription.ending_at = payload.ending_at;
    subscription.updated_at = Utc::now();

    let subscription = repo.update_subscription(&subscription).await?;
    Ok(Json(SubscriptionResponse::from(subscription)))
}

#[derive(Debug)]
enum SubscriptionAction {
    Accept(AcceptSubscription),
    Reject(RejectSubscription),
    Pause,
    Resume,
    Close,
}

fn apply_action(
    subscription: &mut Subscription,
    action: SubscriptionAction,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let now = Utc::now();
    match action {
        SubscriptionAction::Accept(payload) => {
            if subscription.status != SubscriptionStatus::Pending {
                return Err(invalid_status(subscription, "accepted"));
            }
            let starting_at = payload.starting_at.unwrap_or(now);
            check_period(Some(starting_at), payload.ending_at)?;
            subscription.status = SubscriptionStatus::Accepted;
            subscription.starting_at = Some(starting_at);
            subscription.ending_at = payload.ending_at;
            subscription.reason = payload.reason;
            subscription.processed_at = Some(now);
            subscription.processed_by = Some(user_id);
        }
        SubscriptionAction::Reject(payload) => {
            if subscription.status != SubscriptionStatus::Pending {
                return Err(invalid_status(subscription, "rejected"));
            }
            subscription.status = SubscriptionStatus::Rejected;
            subscription.reason = payload.reason;
            subscription.processed_at = Some(now);
            subscription.processed_by = Some(user_id);
        }
        SubscriptionAction::Pause => {
            if subscription.status != SubscriptionStatus::Accepted {
                return Err(invalid_status(subscription, "paused"));
            }
            subscription.status = SubscriptionStatus::Paused;
            subscription.paused_at = Some(now);
        }
        SubscriptionAction::Resume => {
            if subscription.status != SubscriptionStatus::Paused {
                return Err(invalid_status(subscription, "resumed"));
            }
            subscription.status = SubscriptionStatus::Accepted;
            subscription.paused_at = None;
        }
        SubscriptionAction::Close => return close_subscription(subscription, user_id),
    }
    subscription.updated_at = now;
    Ok(())
}

async fn run_action(
    state: &AppState,
    user: &AuthUser,
    env_id: &str,
    api_id: Uuid,
    subscription_id: Uuid,
    action: SubscriptionAction,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    authorize_api(
        state,
        user,
        env_id,
        api_id,
        RolePermission::ApiSubscription,
        RolePermissionAction::Update,
    )
    .await?;

    let repo = state.repo.as_ref();
    let mut subscription = load_subscription(repo, api_id, subscription_id).await?;
    apply_action(&mut subscription, action, user.id)?;

    let subscription = repo.update_subscription(&subscription).await?;
    tracing::info!(
        %api_id,
        %subscription_id,
        status = %subscription.status,
        "subscription status changed"
    );
    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// accept_subscription
///
/// `PENDING` to `ACCEPTED`. The period starts now unless `startingAt` is given.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}/_accept",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    request_body = AcceptSubscription,
    responses(
        (status = 200, description = "Subscription accepted", body = SubscriptionResponse),
        (status = 400, description = "Not pending", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn accept_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
    payload: Option<Json<AcceptSubscription>>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    run_action(
        &state,
        &user,
        &env_id,
        api_id,
        subscription_id,
        SubscriptionAction::Accept(payload),
    )
    .await
}

/// reject_subscription
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}/_reject",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    request_body = RejectSubscription,
    responses(
        (status = 200, description = "Subscription rejected", body = SubscriptionResponse),
        (status = 400, description = "Not pending", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn reject_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
    payload: Option<Json<RejectSubscription>>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    run_action(
        &state,
        &user,
        &env_id,
        api_id,
        subscription_id,
        SubscriptionAction::Reject(payload),
    )
    .await
}

/// pause_subscription
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}/_pause",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    responses(
        (status = 200, description = "Subscription paused", body = SubscriptionResponse),
        (status = 400, description = "Not accepted", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn pause_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    run_action(&state, &user, &env_id, api_id, subscription_id, SubscriptionAction::Pause).await
}

/// resume_subscription
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}/_resume",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    responses(
        (status = 200, description = "Subscription resumed", body = SubscriptionResponse),
        (status = 400, description = "Not paused", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn resume_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    run_action(&state, &user, &env_id, api_id, subscription_id, SubscriptionAction::Resume).await
}

/// close_subscription_handler
///
/// Rejects a pending subscription, closes an accepted or paused one.
#[utoipa::path(
    post,
    path = "/environments/{envId}/apis/{apiId}/subscriptions/{subscriptionId}/_close",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("subscriptionId" = Uuid, Path)),
    responses(
        (status = 200, description = "Subscription closed", body = SubscriptionResponse),
        (status = 400, description = "Already closed or rejected", body = ErrorBody)
    ),
    tag = "subscriptions"
)]
pub async fn close_subscription_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, subscription_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    run_action(&state, &user, &env_id, api_id, subscription_id, SubscriptionAction::Close).await
}
