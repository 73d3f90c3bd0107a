use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, RepositoryError},
    models::{ENVIRONMENT_ADMIN, Environment, RoleScope},
    repository::Repository,
};

/// RolePermission
///
/// What a role grants access to. The environment-level permission is checked
/// against the user's environment role; the API-level ones against the user's
/// membership on the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RolePermission {
    EnvironmentApi,
    ApiDefinition,
    ApiPlan,
    ApiSubscription,
    ApiMember,
    ApiMetadata,
    ApiLog,
}

impl RolePermission {
    pub const API_SCOPED: &'static [RolePermission] = &[
        RolePermission::ApiDefinition,
        RolePermission::ApiPlan,
        RolePermission::ApiSubscription,
        RolePermission::ApiMember,
        RolePermission::ApiMetadata,
        RolePermission::ApiLog,
    ];

    pub fn scope(&self) -> RoleScope {
        match self {
            RolePermission::EnvironmentApi => RoleScope::Environment,
            _ => RoleScope::Api,
        }
    }

    /// The key this permission is stored under in a role's permission map.
    pub fn key(&self) -> &'static str {
        match self {
            RolePermission::EnvironmentApi => "API",
            RolePermission::ApiDefinition => "DEFINITION",
            RolePermission::ApiPlan => "PLAN",
            RolePermission::ApiSubscription => "SUBSCRIPTION",
            RolePermission::ApiMember => "MEMBER",
            RolePermission::ApiMetadata => "METADATA",
            RolePermission::ApiLog => "LOG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RolePermissionAction {
    Create,
    Read,
    Update,
    Delete,
}

impl RolePermissionAction {
    pub fn letter(&self) -> char {
        match self {
            RolePermissionAction::Create => 'C',
            RolePermissionAction::Read => 'R',
            RolePermissionAction::Update => 'U',
            RolePermissionAction::Delete => 'D',
        }
    }
}

/// ExecutionContext
///
/// The organization and environment a request operates in, resolved from the
/// `{envId}` path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub organization_id: String,
    pub environment_id: String,
}

impl From<Environment> for ExecutionContext {
    fn from(environment: Environment) -> Self {
        Self {
            organization_id: environment.organization_id,
            environment_id: environment.id,
        }
    }
}

impl ExecutionContext {
    /// resolve
    ///
    /// Looks the environment up. An unknown environment is a 404.
    pub async fn resolve(repo: &dyn Repository, env_id: &str) -> Result<Self, ApiError> {
        repo.find_environment(env_id)
            .await?
            .map(ExecutionContext::from)
            .ok_or_else(|| ApiError::not_found("Environment", env_id))
    }
}

fn is_environment_admin(user: &AuthUser) -> bool {
    user.role == ENVIRONMENT_ADMIN
}

/// has_permission
///
/// Evaluates `permission:action` for `user` on `reference_id`: the environment
/// id for environment-scoped permissions, the API id otherwise.
pub async fn has_permission(
    repo: &dyn Repository,
    ctx: &ExecutionContext,
    user: &AuthUser,
    permission: RolePermission,
    reference_id: &str,
    action: RolePermissionAction,
) -> Result<bool, RepositoryError> {
    match permission.scope() {
        RoleScope::Environment => {
            if reference_id != ctx.environment_id {
                return Ok(false);
            }
            let role = repo.find_role(RoleScope::Environment, &user.role).await?;
            Ok(role.is_some_and(|role| role.allows(permission, action)))
        }
        RoleScope::Api => {
            if is_environment_admin(user) {
                return Ok(true);
            }
            let Ok(api_id) = Uuid::parse_str(reference_id) else {
                return Ok(false);
            };
            let Some(membership) = repo.find_membership(api_id, user.id).await? else {
                return Ok(false);
            };
            let role = repo.find_role(RoleScope::Api, &membership.role_name).await?;
            Ok(role.is_some_and(|role| role.allows(permission, action)))
        }
    }
}

/// require_permission
///
/// [`has_permission`] as a guard: a denial becomes a 403.
pub async fn require_permission(
    repo: &dyn Repository,
    ctx: &ExecutionContext,
    user: &AuthUser,
    permission: RolePermission,
    reference_id: &str,
    action: RolePermissionAction,
) -> Result<(), ApiError> {
    if has_permission(repo, ctx, user, permission, reference_id, action).await? {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %user.id,
            permission = permission.key(),
            action = %action.letter(),
            reference_id,
            "permission denied"
        );
        Err(ApiError::Forbidden)
    }
}

/// effective_permissions
///
/// The permission map `user` holds on an API. Environment admins hold every
/// API permission.
pub async fn effective_permissions(
    repo: &dyn Repository,
    user: &AuthUser,
    api_id: Uuid,
) -> Result<BTreeMap<String, String>, RepositoryError> {
    if is_environment_admin(user) {
        return Ok(RolePermission::API_SCOPED
            .iter()
            .map(|permission| (permission.key().to_string(), "CRUD".to_string()))
            .collect());
    }

    let Some(membership) = repo.find_membership(api_id, user.id).await? else {
        return Ok(BTreeMap::new());
    };

    Ok(repo
        .find_role(RoleScope::Api, &membership.role_name)
        .await?
        .map(|role| role.permissions)
        .unwrap_or_default())
}
