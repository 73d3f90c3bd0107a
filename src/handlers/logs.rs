use std::collections::HashMap;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{authorize_api, parse_list};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    extract::{Json, Path, Query},
    links::{RequestUri, build_links},
    models::{
        ApiLog, ApiLogDetail, ApiLogsResponse, ApiMessageLog, ApiMessageLogsResponse,
        BaseApplication, BasePlan,
    },
    pagination::PaginationParam,
    permission::{RolePermission, RolePermissionAction},
    repository::LogQuery,
};

/// LogSearchParams
///
/// Filters of `GET /logs`. `from` and `to` are epoch milliseconds; list
/// values are comma-separated.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct LogSearchParams {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub application_ids: Option<String>,
    pub plan_ids: Option<String>,
    pub methods: Option<String>,
    pub statuses: Option<String>,
}

fn millis(value: i64, field: &str) -> Result<DateTime<Utc>, ApiError> {
    if value < 0 {
        return Err(ApiError::validation(format!("{field} must be a positive timestamp")));
    }
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| ApiError::validation(format!("{field} is out of range")))
}

impl LogSearchParams {
    fn to_query(&self, api_id: Uuid) -> Result<LogQuery, ApiError> {
        let from = self.from.map(|value| millis(value, "from")).transpose()?;
        let to = self.to.map(|value| millis(value, "to")).transpose()?;
        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                return Err(ApiError::validation("'to' must be after 'from'"));
            }
        }

        let methods: Vec<String> = parse_list(self.methods.as_deref(), "methods")?;
        Ok(LogQuery {
            from,
            to,
            application_ids: parse_list(self.application_ids.as_deref(), "applicationIds")?,
            plan_ids: parse_list(self.plan_ids.as_deref(), "planIds")?,
            methods: methods.into_iter().map(|m| m.to_uppercase()).collect(),
            statuses: parse_list(self.statuses.as_deref(), "statuses")?,
            ..LogQuery::for_api(api_id)
        })
    }
}

/// list_logs
///
/// Connection logs of an API, newest first. Only the requested window is
/// fetched from the store.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/logs",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), LogSearchParams, PaginationParam),
    responses(
        (status = 200, description = "Page of connection logs", body = ApiLogsResponse),
        (status = 400, description = "Invalid filter", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    tag = "logs"
)]
pub async fn list_logs(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id)): Path<(String, Uuid)>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
    Query(params): Query<LogSearchParams>,
) -> Result<Json<ApiLogsResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiLog,
        RolePermissionAction::Read,
    )
    .await?;

    let repo = state.repo.as_ref();
    let query = params.to_query(api_id)?;
    let total = repo.count_connection_logs(&query).await?;
    let window = pagination.window(total)?;
    let logs = if window.is_empty() {
        vec![]
    } else {
        repo.search_connection_logs(&query, window.offset(), window.per_page)
            .await?
    };

    let mut plan_ids: Vec<Uuid> = logs.iter().filter_map(|log| log.plan_id).collect();
    plan_ids.sort();
    plan_ids.dedup();
    let mut application_ids: Vec<Uuid> = logs.iter().filter_map(|log| log.application_id).collect();
    application_ids.sort();
    application_ids.dedup();

    let plans: HashMap<Uuid, BasePlan> = repo
        .find_plans(&plan_ids)
        .await?
        .into_iter()
        .map(|plan| (plan.id, BasePlan::from(plan)))
        .collect();
    let applications: HashMap<Uuid, BaseApplication> = repo
        .find_applications(&application_ids)
        .await?
        .into_iter()
        .map(|application| (application.id, BaseApplication::from(application)))
        .collect();

    let data = logs
        .into_iter()
        .map(|log| {
            let plan = log.plan_id.map(|id| {
                plans
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| BasePlan::unknown(id))
            });
            let application = log.application_id.map(|id| {
                applications
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| BaseApplication::unknown(id))
            });
            ApiLog::new(log, plan, application)
        })
        .collect();

    Ok(Json(ApiLogsResponse {
        data,
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}

/// get_log
///
/// Request and response captured on both sides of the gateway.
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/logs/{requestId}",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("requestId" = String, Path)),
    responses(
        (status = 200, description = "Connection log detail", body = ApiLogDetail),
        (status = 404, description = "No such log", body = ErrorBody)
    ),
    tag = "logs"
)]
pub async fn get_log(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, request_id)): Path<(String, Uuid, String)>,
) -> Result<Json<ApiLogDetail>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiLog,
        RolePermissionAction::Read,
    )
    .await?;

    match state
        .repo
        .find_connection_log_detail(api_id, &request_id)
        .await?
    {
        Some(detail) => Ok(Json(ApiLogDetail::from(detail))),
        None => Err(ApiError::LogNotFound {
            api_id: api_id.to_string(),
            request_id,
        }),
    }
}

/// list_messages
#[utoipa::path(
    get,
    path = "/environments/{envId}/apis/{apiId}/logs/{requestId}/messages",
    params(("envId" = String, Path), ("apiId" = Uuid, Path), ("requestId" = String, Path), PaginationParam),
    responses(
        (status = 200, description = "Page of message logs", body = ApiMessageLogsResponse),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    tag = "logs"
)]
pub async fn list_messages(
    user: AuthUser,
    State(state): State<AppState>,
    Path((env_id, api_id, request_id)): Path<(String, Uuid, String)>,
    uri: RequestUri,
    Query(pagination): Query<PaginationParam>,
) -> Result<Json<ApiMessageLogsResponse>, ApiError> {
    authorize_api(
        &state,
        &user,
        &env_id,
        api_id,
        RolePermission::ApiLog,
        RolePermissionAction::Read,
    )
    .await?;

    let repo = state.repo.as_ref();
    let total = repo.count_message_logs(api_id, &request_id).await?;
    let window = pagination.window(total)?;
    let messages = if window.is_empty() {
        vec![]
    } else {
        repo.search_message_logs(api_id, &request_id, window.offset(), window.per_page)
            .await?
    };

    Ok(Json(ApiMessageLogsResponse {
        data: messages.into_iter().map(ApiMessageLog::from).collect(),
        pagination: window.pagination(),
        links: build_links(uri.as_str(), &window),
    }))
}
