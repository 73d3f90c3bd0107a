use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Application
///
/// A consumer application that subscribes to API plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub environment_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// BaseApplication
///
/// The application summary embedded in subscriptions and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BaseApplication {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BaseApplication {
    pub fn id_only(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            description: None,
        }
    }

    pub fn unknown(id: Uuid) -> Self {
        Self {
            name: Some("Unknown application".to_string()),
            ..Self::id_only(id)
        }
    }
}

impl From<Application> for BaseApplication {
    fn from(application: Application) -> Self {
        Self {
            id: application.id,
            name: Some(application.name),
            description: application.description,
        }
    }
}
