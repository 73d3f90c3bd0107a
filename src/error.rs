use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// RepositoryError
///
/// Failures raised by the persistence layer. Both repository implementations
/// (Postgres and in-memory) return this type so the handlers never depend on
/// a specific driver.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} [{id}] does not exist")]
    Missing { entity: &'static str, id: String },
}

/// ApiError
///
/// Every failure a resource can answer with. Each variant maps to one HTTP
/// status and to the JSON error body described by [`ErrorBody`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("You do not have sufficient rights to access this resource")]
    Forbidden,

    #[error("{kind} [{id}] cannot be found.")]
    NotFound { kind: &'static str, id: String },

    #[error("No log found for api: {api_id} and requestId: {request_id}")]
    LogNotFound { api_id: String, request_id: String },

    #[error("Validation error")]
    Validation(Vec<String>),

    #[error("{message}")]
    BadRequest {
        technical_code: &'static str,
        message: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApiError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ApiError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn bad_request(technical_code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            technical_code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } | ApiError::LogNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let http_status = self.status().as_u16();
        match self {
            ApiError::NotFound { kind, id } => {
                let kind = kind.to_lowercase();
                ErrorBody {
                    http_status,
                    message: self.to_string(),
                    technical_code: Some(format!("{kind}.notFound")),
                    parameters: Some(BTreeMap::from([(kind, id.clone())])),
                    details: None,
                }
            }
            ApiError::LogNotFound { api_id, request_id } => ErrorBody {
                http_status,
                message: self.to_string(),
                technical_code: Some("log.notFound".to_string()),
                parameters: Some(BTreeMap::from([
                    ("api".to_string(), api_id.clone()),
                    ("requestId".to_string(), request_id.clone()),
                ])),
                details: None,
            },
            ApiError::Validation(messages) => ErrorBody {
                http_status,
                message: self.to_string(),
                technical_code: Some("validation.error".to_string()),
                parameters: None,
                details: Some(
                    messages
                        .iter()
                        .map(|message| ErrorDetail {
                            message: message.clone(),
                        })
                        .collect(),
                ),
            },
            ApiError::BadRequest { technical_code, .. } => ErrorBody {
                http_status,
                message: self.to_string(),
                technical_code: Some(technical_code.to_string()),
                parameters: None,
                details: None,
            },
            // Driver messages stay in the logs.
            ApiError::Repository(_) => ErrorBody {
                http_status,
                message: "Internal server error".to_string(),
                technical_code: Some("technical.error".to_string()),
                parameters: None,
                details: None,
            },
            ApiError::Unauthorized | ApiError::Forbidden => ErrorBody {
                http_status,
                message: self.to_string(),
                technical_code: None,
                parameters: None,
                details: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Repository(e) = &self {
            tracing::error!(error = %e, "repository failure");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// ErrorBody
///
/// JSON payload returned with every non-2xx answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub http_status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ErrorDetail>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
}
