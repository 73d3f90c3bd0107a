use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{links::Links, pagination::Pagination};

use super::{RoleScope, User};

/// Membership
///
/// Links a user to an API with an API-scope role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub api_id: Uuid,
    pub user_id: Uuid,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AddMember {
    pub user_id: Uuid,
    pub role_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMember {
    pub role_name: String,
}

/// TransferOwnership
///
/// Input payload for `POST /members/_transfer-ownership`. The previous primary
/// owner keeps `poRole` (defaults to `OWNER`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnership {
    pub user_id: Uuid,
    pub po_role: Option<String>,
}

// --- REST Representations ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MemberRole {
    pub name: String,
    pub scope: RoleScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<MemberRole>,
}

impl MemberResponse {
    pub fn new(user: User, membership: &Membership) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            roles: vec![MemberRole {
                name: membership.role_name.clone(),
                scope: RoleScope::Api,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryOwner {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

impl From<User> for PrimaryOwner {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
        }
    }
}

/// The caller's effective permissions on an API, keyed by permission name.
pub type MemberPermissions = BTreeMap<String, String>;

/// Page of `GET /apis/{apiId}/members`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MembersResponse {
    pub data: Vec<MemberResponse>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
