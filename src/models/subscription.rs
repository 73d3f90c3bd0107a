use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{links::Links, pagination::Pagination};

use super::{BaseApplication, BasePlan};

string_enum! {
    SubscriptionStatus {
        Pending => "PENDING",
        Accepted => "ACCEPTED",
        Paused => "PAUSED",
        Rejected => "REJECTED",
        Closed => "CLOSED",
    }
}

impl SubscriptionStatus {
    /// Statuses that still hold a slot on the plan.
    pub const ACTIVE: &'static [SubscriptionStatus] = &[
        SubscriptionStatus::Pending,
        SubscriptionStatus::Accepted,
        SubscriptionStatus::Paused,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

/// Subscription
///
/// An application's subscription to one plan of an API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub api_id: Uuid,
    pub plan_id: Uuid,
    pub application_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: SubscriptionStatus,
    pub request: Option<String>,
    pub reason: Option<String>,
    pub subscribed_by: Uuid,
    pub processed_by: Option<Uuid>,
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscription {
    pub plan_id: Uuid,
    pub application_id: Uuid,
    pub request: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscription {
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AcceptSubscription {
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RejectSubscription {
    pub reason: Option<String>,
}

// --- REST Representations ---

/// SubscriptionResponse
///
/// `plan` and `application` always carry the ids; names are added with
/// `expands=plan,application`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub status: SubscriptionStatus,
    pub plan: BasePlan,
    pub application: BaseApplication,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub subscribed_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            status: subscription.status,
            plan: BasePlan::id_only(subscription.plan_id),
            application: BaseApplication::id_only(subscription.application_id),
            request: subscription.request,
            reason: subscription.reason,
            subscribed_by: subscription.subscribed_by,
            processed_by: subscription.processed_by,
            starting_at: subscription.starting_at,
            ending_at: subscription.ending_at,
            processed_at: subscription.processed_at,
            paused_at: subscription.paused_at,
            closed_at: subscription.closed_at,
            created_at: subscription.created_at,
            updated_at: subscription.updated_at,
        }
    }
}

/// Page of `GET /apis/{apiId}/subscriptions`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubscriptionsResponse {
    pub data: Vec<SubscriptionResponse>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
