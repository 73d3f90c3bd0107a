use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{links::Links, pagination::Pagination};

use super::{BaseApplication, BasePlan};

pub type LogHeaders = BTreeMap<String, Vec<String>>;

/// ConnectionLog
///
/// One request handled by the gateway for an API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConnectionLog {
    pub request_id: String,
    pub api_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub application_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub client_identifier: Option<String>,
    pub transaction_id: Option<String>,
    pub method: String,
    pub status: i32,
    pub uri: String,
    pub request_ended: bool,
    pub gateway_response_time_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogRequest {
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: LogHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogResponse {
    pub status: i32,
    #[serde(default)]
    pub headers: LogHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// ConnectionLogDetail
///
/// The captured request and response on both sides of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConnectionLogDetail {
    pub request_id: String,
    pub api_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub client_identifier: Option<String>,
    pub request_ended: bool,
    #[sqlx(json)]
    pub entrypoint_request: LogRequest,
    #[sqlx(json)]
    pub entrypoint_response: LogResponse,
    #[sqlx(json)]
    pub endpoint_request: LogRequest,
    #[sqlx(json)]
    pub endpoint_response: LogResponse,
}

string_enum! {
    MessageOperation {
        Publish => "PUBLISH",
        Subscribe => "SUBSCRIBE",
    }
}

string_enum! {
    ConnectorType {
        Entrypoint => "ENTRYPOINT",
        Endpoint => "ENDPOINT",
    }
}

/// MessageLog
///
/// A message exchanged over a long-lived connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MessageLog {
    pub id: Uuid,
    pub api_id: Uuid,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub operation: MessageOperation,
    #[sqlx(try_from = "String")]
    pub connector_type: ConnectorType,
    pub connector_id: String,
    pub message_id: Option<String>,
    pub payload: Option<String>,
    #[sqlx(json)]
    pub headers: LogHeaders,
    #[sqlx(json)]
    pub metadata: BTreeMap<String, String>,
}

// --- REST Representations ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiLog {
    pub request_id: String,
    pub api_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub status: i32,
    pub uri: String,
    pub request_ended: bool,
    pub gateway_response_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<BasePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<BaseApplication>,
}

impl ApiLog {
    pub fn new(
        log: ConnectionLog,
        plan: Option<BasePlan>,
        application: Option<BaseApplication>,
    ) -> Self {
        Self {
            request_id: log.request_id,
            api_id: log.api_id,
            timestamp: log.timestamp,
            method: log.method,
            status: log.status,
            uri: log.uri,
            request_ended: log.request_ended,
            gateway_response_time_ms: log.gateway_response_time_ms,
            client_identifier: log.client_identifier,
            transaction_id: log.transaction_id,
            plan,
            application,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogExchange {
    pub request: LogRequest,
    pub response: LogResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiLogDetail {
    pub request_id: String,
    pub api_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_identifier: Option<String>,
    pub request_ended: bool,
    pub entrypoint: LogExchange,
    pub endpoint: LogExchange,
}

impl From<ConnectionLogDetail> for ApiLogDetail {
    fn from(detail: ConnectionLogDetail) -> Self {
        Self {
            request_id: detail.request_id,
            api_id: detail.api_id,
            timestamp: detail.timestamp,
            client_identifier: detail.client_identifier,
            request_ended: detail.request_ended,
            entrypoint: LogExchange {
                request: detail.entrypoint_request,
                response: detail.entrypoint_response,
            },
            endpoint: LogExchange {
                request: detail.endpoint_request,
                response: detail.endpoint_response,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessageLog {
    pub id: Uuid,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: MessageOperation,
    pub connector_type: ConnectorType,
    pub connector_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub headers: LogHeaders,
    pub metadata: BTreeMap<String, String>,
}

impl From<MessageLog> for ApiMessageLog {
    fn from(log: MessageLog) -> Self {
        Self {
            id: log.id,
            request_id: log.request_id,
            timestamp: log.timestamp,
            operation: log.operation,
            connector_type: log.connector_type,
            connector_id: log.connector_id,
            message_id: log.message_id,
            payload: log.payload,
            headers: log.headers,
            metadata: log.metadata,
        }
    }
}

/// Page of `GET /apis/{apiId}/logs`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiLogsResponse {
    pub data: Vec<ApiLog>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

/// Page of `GET /apis/{apiId}/logs/{requestId}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiMessageLogsResponse {
    pub data: Vec<ApiMessageLog>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
