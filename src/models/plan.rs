use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{links::Links, pagination::Pagination};

string_enum! {
    PlanStatus {
        Staging => "STAGING",
        Published => "PUBLISHED",
        Deprecated => "DEPRECATED",
        Closed => "CLOSED",
    }
}

string_enum! {
    PlanSecurityType {
        KeyLess => "KEY_LESS",
        ApiKey => "API_KEY",
        Jwt => "JWT",
        Oauth2 => "OAUTH2",
        Mtls => "MTLS",
    }
}

string_enum! {
    PlanMode {
        Standard => "STANDARD",
        Push => "PUSH",
    }
}

string_enum! {
    /// How new subscriptions to a plan are validated.
    PlanValidation {
        Auto => "AUTO",
        Manual => "MANUAL",
    }
}

/// Plan
///
/// A plan of an API. `security` is absent for `PUSH` plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub api_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: PlanStatus,
    pub security: Option<PlanSecurityType>,
    pub mode: PlanMode,
    pub validation: PlanValidation,
    pub characteristics: Vec<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

fn decode_enum<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = super::UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: super::UnknownVariant| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for Plan {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let security = row
            .try_get::<Option<String>, _>("security")?
            .map(|raw| raw.parse::<PlanSecurityType>())
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "security".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            api_id: row.try_get("api_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: decode_enum(row, "status")?,
            security,
            mode: decode_enum(row, "mode")?,
            validation: decode_enum(row, "validation")?,
            characteristics: row.try_get("characteristics")?,
            order: row.try_get("order")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            published_at: row.try_get("published_at")?,
            closed_at: row.try_get("closed_at")?,
        })
    }
}

impl Plan {
    /// A plan accepting new subscriptions.
    pub fn is_subscribable(&self) -> bool {
        self.status == PlanStatus::Published && self.security != Some(PlanSecurityType::KeyLess)
    }
}

// --- Request Payloads ---

/// CreatePlan
///
/// Input payload for `POST /apis/{apiId}/plans`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlan {
    pub name: String,
    pub description: Option<String>,
    pub mode: Option<PlanMode>,
    pub security: Option<PlanSecurityType>,
    pub validation: Option<PlanValidation>,
    #[serde(default)]
    pub characteristics: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlan {
    pub name: Option<String>,
    pub description: Option<String>,
    pub validation: Option<PlanValidation>,
    pub characteristics: Option<Vec<String>>,
    pub order: Option<i32>,
}

// --- REST Representations ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: Uuid,
    pub api_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: PlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<PlanSecurityType>,
    pub mode: PlanMode,
    pub validation: PlanValidation,
    pub characteristics: Vec<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            api_id: plan.api_id,
            name: plan.name,
            description: plan.description,
            status: plan.status,
            security: plan.security,
            mode: plan.mode,
            validation: plan.validation,
            characteristics: plan.characteristics,
            order: plan.order,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
            published_at: plan.published_at,
            closed_at: plan.closed_at,
        }
    }
}

/// BasePlan
///
/// The plan summary embedded in subscriptions and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BasePlan {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<PlanSecurityType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PlanMode>,
}

impl BasePlan {
    pub fn id_only(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            security: None,
            mode: None,
        }
    }

    pub fn unknown(id: Uuid) -> Self {
        Self {
            name: Some("Unknown plan".to_string()),
            ..Self::id_only(id)
        }
    }
}

impl From<Plan> for BasePlan {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            name: Some(plan.name),
            security: plan.security,
            mode: Some(plan.mode),
        }
    }
}

/// Page of `GET /apis/{apiId}/plans`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PlansResponse {
    pub data: Vec<PlanResponse>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
