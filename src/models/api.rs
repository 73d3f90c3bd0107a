use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{links::Links, pagination::Pagination};

use super::member::PrimaryOwner;

string_enum! {
    DefinitionVersion {
        V2 => "V2",
        V4 => "V4",
    }
}

string_enum! {
    /// Deployment state on the gateway.
    ApiState {
        Started => "STARTED",
        Stopped => "STOPPED",
    }
}

string_enum! {
    ApiLifecycleState {
        Created => "CREATED",
        Published => "PUBLISHED",
        Unpublished => "UNPUBLISHED",
        Deprecated => "DEPRECATED",
        Archived => "ARCHIVED",
    }
}

string_enum! {
    Visibility {
        Public => "PUBLIC",
        Private => "PRIVATE",
    }
}

/// Api
///
/// A managed API, stored in the `apis` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Api {
    pub id: Uuid,
    pub environment_id: String,
    pub name: String,
    pub api_version: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub definition_version: DefinitionVersion,
    #[sqlx(try_from = "String")]
    pub state: ApiState,
    #[sqlx(try_from = "String")]
    pub lifecycle_state: ApiLifecycleState,
    #[sqlx(try_from = "String")]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// CreateApi
///
/// Input payload for `POST /apis`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateApi {
    pub name: String,
    pub api_version: String,
    pub description: Option<String>,
    pub definition_version: Option<DefinitionVersion>,
    pub visibility: Option<Visibility>,
}

/// UpdateApi
///
/// Input payload for `PUT /apis/{apiId}`. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApi {
    pub name: Option<String>,
    pub api_version: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub lifecycle_state: Option<ApiLifecycleState>,
}

// --- REST Representations ---

/// ApiResponse
///
/// REST view of an [`Api`]. `primaryOwner` is only filled with `expands=primaryOwner`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub id: Uuid,
    pub name: String,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub definition_version: DefinitionVersion,
    pub state: ApiState,
    pub lifecycle_state: ApiLifecycleState,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_owner: Option<PrimaryOwner>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Api> for ApiResponse {
    fn from(api: Api) -> Self {
        Self {
            id: api.id,
            name: api.name,
            api_version: api.api_version,
            description: api.description,
            definition_version: api.definition_version,
            state: api.state,
            lifecycle_state: api.lifecycle_state,
            visibility: api.visibility,
            primary_owner: None,
            created_at: api.created_at,
            updated_at: api.updated_at,
        }
    }
}

/// Page of `GET /apis`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApisResponse {
    pub data: Vec<ApiResponse>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
