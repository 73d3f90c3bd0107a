use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::permission::{RolePermission, RolePermissionAction};

pub const ENVIRONMENT_ADMIN: &str = "ADMIN";
pub const ENVIRONMENT_USER: &str = "USER";
pub const PRIMARY_OWNER: &str = "PRIMARY_OWNER";
pub const API_OWNER: &str = "OWNER";
pub const API_USER: &str = "USER";
pub const API_REVIEWER: &str = "REVIEWER";

string_enum! {
    /// The level a role applies to.
    RoleScope {
        Environment => "ENVIRONMENT",
        Api => "API",
    }
}

/// Role
///
/// A named set of permissions. `permissions` maps a permission key (`PLAN`,
/// `MEMBER`, ...) to the allowed actions, written as a subset of `"CRUD"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub scope: RoleScope,
    pub name: String,
    #[sqlx(json)]
    pub permissions: BTreeMap<String, String>,
}

impl Role {
    pub fn new(scope: RoleScope, name: &str, permissions: &[(RolePermission, &str)]) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            name: name.to_string(),
            permissions: permissions
                .iter()
                .map(|(permission, actions)| (permission.key().to_string(), actions.to_string()))
                .collect(),
        }
    }

    pub fn allows(&self, permission: RolePermission, action: RolePermissionAction) -> bool {
        permission.scope() == self.scope
            && self
                .permissions
                .get(permission.key())
                .is_some_and(|actions| actions.contains(action.letter()))
    }

    /// defaults
    ///
    /// The roles every installation starts with. Mirrors the seed in
    /// `migrations/`.
    pub fn defaults() -> Vec<Role> {
        use RolePermission::*;

        vec![
            Role::new(RoleScope::Environment, ENVIRONMENT_ADMIN, &[(EnvironmentApi, "CRUD")]),
            Role::new(RoleScope::Environment, ENVIRONMENT_USER, &[(EnvironmentApi, "CR")]),
            Role::new(
                RoleScope::Api,
                PRIMARY_OWNER,
                &[
                    (ApiDefinition, "CRUD"),
                    (ApiPlan, "CRUD"),
                    (ApiSubscription, "CRUD"),
                    (ApiMember, "CRUD"),
                    (ApiMetadata, "CRUD"),
                    (ApiLog, "CRUD"),
                ],
            ),
            Role::new(
                RoleScope::Api,
                API_OWNER,
                &[
                    (ApiDefinition, "RU"),
                    (ApiPlan, "CRUD"),
                    (ApiSubscription, "CRUD"),
                    (ApiMember, "CRUD"),
                    (ApiMetadata, "CRUD"),
                    (ApiLog, "R"),
                ],
            ),
            Role::new(
                RoleScope::Api,
                API_USER,
                &[
                    (ApiDefinition, "R"),
                    (ApiPlan, "R"),
                    (ApiMember, "R"),
                    (ApiMetadata, "R"),
                ],
            ),
            Role::new(
                RoleScope::Api,
                API_REVIEWER,
                &[
                    (ApiDefinition, "R"),
                    (ApiPlan, "R"),
                    (ApiMetadata, "R"),
                    (ApiLog, "R"),
                ],
            ),
        ]
    }
}
