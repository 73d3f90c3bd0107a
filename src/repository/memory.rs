use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ApiQuery, LogQuery, Repository, RepositoryResult, SubscriptionQuery};
use crate::{
    error::RepositoryError,
    models::{
        Api, Application, ConnectionLog, ConnectionLogDetail, Environment, Membership, MessageLog,
        Metadata, PRIMARY_OWNER, Plan, Role, RoleScope, Subscription, User,
    },
};

#[derive(Default)]
struct Store {
    environments: Vec<Environment>,
    users: HashMap<Uuid, User>,
    roles: Vec<Role>,
    applications: HashMap<Uuid, Application>,
    apis: HashMap<Uuid, Api>,
    plans: HashMap<Uuid, Plan>,
    memberships: Vec<Membership>,
    subscriptions: HashMap<Uuid, Subscription>,
    metadata: Vec<Metadata>,
    connection_logs: Vec<ConnectionLog>,
    log_details: Vec<ConnectionLogDetail>,
    message_logs: Vec<MessageLog>,
}

/// InMemoryRepository
///
/// A `RwLock`-guarded store implementing [`Repository`]. Starts with the
/// default environment and roles. Users, applications and logs are produced
/// outside this service, so they are seeded through the `add_*` helpers.
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn window<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store {
                environments: vec![Environment::default_environment()],
                roles: Role::defaults(),
                ..Store::default()
            }),
        }
    }

    // --- Seeding ---

    pub async fn add_environment(&self, environment: Environment) -> Environment {
        self.store.write().await.environments.push(environment.clone());
        environment
    }

    pub async fn add_user(&self, user: User) -> User {
        self.store.write().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_application(&self, application: Application) -> Application {
        self.store
            .write()
            .await
            .applications
            .insert(application.id, application.clone());
        application
    }

    pub async fn add_connection_log(&self, log: ConnectionLog) {
        self.store.write().await.connection_logs.push(log);
    }

    pub async fn add_connection_log_detail(&self, detail: ConnectionLogDetail) {
        self.store.write().await.log_details.push(detail);
    }

    pub async fn add_message_log(&self, log: MessageLog) {
        self.store.write().await.message_logs.push(log);
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_environment(&self, id: &str) -> RepositoryResult<Option<Environment>> {
        let store = self.store.read().await;
        Ok(store.environments.iter().find(|e| e.id == id).cloned())
    }

    async fn find_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> RepositoryResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(ids.iter().filter_map(|id| store.users.get(id).cloned()).collect())
    }

    async fn find_role(&self, scope: RoleScope, name: &str) -> RepositoryResult<Option<Role>> {
        let store = self.store.read().await;
        Ok(store
            .roles
            .iter()
            .find(|r| r.scope == scope && r.name == name)
            .cloned())
    }

    async fn find_application(&self, id: Uuid) -> RepositoryResult<Option<Application>> {
        Ok(self.store.read().await.applications.get(&id).cloned())
    }

    async fn find_applications(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Application>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.applications.get(id).cloned())
            .collect())
    }

    async fn find_api(&self, id: Uuid) -> RepositoryResult<Option<Api>> {
        Ok(self.store.read().await.apis.get(&id).cloned())
    }

    async fn search_apis(
        &self,
        environment_id: &str,
        query: &ApiQuery,
    ) -> RepositoryResult<Vec<Api>> {
        let store = self.store.read().await;
        let name = query.name.as_ref().map(|n| n.to_lowercase());
        let mut apis: Vec<Api> = store
            .apis
            .values()
            .filter(|api| api.environment_id == environment_id)
            .filter(|api| query.ids.as_ref().is_none_or(|ids| ids.contains(&api.id)))
            .filter(|api| {
                name.as_ref()
                    .is_none_or(|n| api.name.to_lowercase().contains(n.as_str()))
            })
            .cloned()
            .collect();
        apis.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        Ok(apis)
    }

    async fn create_api(&self, api: Api, primary_owner: Membership) -> RepositoryResult<Api> {
        let mut store = self.store.write().await;
        store.apis.insert(api.id, api.clone());
        store.memberships.push(primary_owner);
        Ok(api)
    }

    async fn update_api(&self, api: &Api) -> RepositoryResult<Api> {
        let mut store = self.store.write().await;
        match store.apis.get_mut(&api.id) {
            Some(existing) => {
                *existing = api.clone();
                Ok(api.clone())
            }
            None => Err(RepositoryError::Missing {
                entity: "Api",
                id: api.id.to_string(),
            }),
        }
    }

    async fn delete_api(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut store = self.store.write().await;
        if store.apis.remove(&id).is_none() {
            return Ok(false);
        }
        store.plans.retain(|_, p| p.api_id != id);
        store.subscriptions.retain(|_, s| s.api_id != id);
        store.memberships.retain(|m| m.api_id != id);
        store.metadata.retain(|m| m.api_id != id);
        Ok(true)
    }

    async fn find_plan(&self, id: Uuid) -> RepositoryResult<Option<Plan>> {
        Ok(self.store.read().await.plans.get(&id).cloned())
    }

    async fn find_plans_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Plan>> {
        let store = self.store.read().await;
        let mut plans: Vec<Plan> = store
            .plans
            .values()
            .filter(|p| p.api_id == api_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(plans)
    }

    async fn find_plans(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Plan>> {
        let store = self.store.read().await;
        Ok(ids.iter().filter_map(|id| store.plans.get(id).cloned()).collect())
    }

    async fn create_plan(&self, plan: Plan) -> RepositoryResult<Plan> {
        self.store.write().await.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn update_plan(&self, plan: &Plan) -> RepositoryResult<Plan> {
        let mut store = self.store.write().await;
        match store.plans.get_mut(&plan.id) {
            Some(existing) => {
                *existing = plan.clone();
                Ok(plan.clone())
            }
            None => Err(RepositoryError::Missing {
                entity: "Plan",
                id: plan.id.to_string(),
            }),
        }
    }

    async fn close_plan(
        &self,
        plan: &Plan,
        subscriptions: &[Subscription],
    ) -> RepositoryResult<Plan> {
        let mut store = self.store.write().await;

        // Check everything before the first write so a failure leaves the store untouched.
        if !store.plans.contains_key(&plan.id) {
            return Err(RepositoryError::Missing {
                entity: "Plan",
                id: plan.id.to_string(),
            });
        }
        if let Some(missing) = subscriptions
            .iter()
            .find(|s| !store.subscriptions.contains_key(&s.id))
        {
            return Err(RepositoryError::Missing {
                entity: "Subscription",
                id: missing.id.to_string(),
            });
        }

        for subscription in subscriptions {
            store
                .subscriptions
                .insert(subscription.id, subscription.clone());
        }
        store.plans.insert(plan.id, plan.clone());
        Ok(plan.clone())
    }

    async fn delete_plan(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut store = self.store.write().await;
        let removed = store.plans.remove(&id).is_some();
        if removed {
            store.subscriptions.retain(|_, s| s.plan_id != id);
        }
        Ok(removed)
    }

    async fn find_membership(
        &self,
        api_id: Uuid,
        user_id: Uuid,
    ) -> RepositoryResult<Option<Membership>> {
        let store = self.store.read().await;
        Ok(store
            .memberships
            .iter()
            .find(|m| m.api_id == api_id && m.user_id == user_id)
            .cloned())
    }

    async fn find_memberships_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Membership>> {
        let store = self.store.read().await;
        Ok(store
            .memberships
            .iter()
            .filter(|m| m.api_id == api_id)
            .cloned()
            .collect())
    }

    async fn find_api_ids_by_member(&self, user_id: Uuid) -> RepositoryResult<Vec<Uuid>> {
        let store = self.store.read().await;
        Ok(store
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.api_id)
            .collect())
    }

    async fn save_membership(&self, membership: &Membership) -> RepositoryResult<()> {
        let mut store = self.store.write().await;
        let existing = store
            .memberships
            .iter()
            .position(|m| m.api_id == membership.api_id && m.user_id == membership.user_id);
        match existing {
            Some(index) => store.memberships[index].role_name = membership.role_name.clone(),
            None => store.memberships.push(membership.clone()),
        }
        Ok(())
    }

    async fn delete_membership(&self, api_id: Uuid, user_id: Uuid) -> RepositoryResult<bool> {
        let mut store = self.store.write().await;
        let before = store.memberships.len();
        store
            .memberships
            .retain(|m| !(m.api_id == api_id && m.user_id == user_id));
        Ok(store.memberships.len() < before)
    }

    async fn transfer_ownership(
        &self,
        api_id: Uuid,
        previous_owner: Uuid,
        new_owner: Uuid,
        previous_owner_role: &str,
    ) -> RepositoryResult<()> {
        let mut store = self.store.write().await;
        let now = chrono::Utc::now();

        for membership in store.memberships.iter_mut().filter(|m| m.api_id == api_id) {
            if membership.user_id == previous_owner {
                membership.role_name = previous_owner_role.to_string();
            } else if membership.user_id == new_owner {
                membership.role_name = PRIMARY_OWNER.to_string();
            }
        }

        let has_new_owner = store
            .memberships
            .iter()
            .any(|m| m.api_id == api_id && m.user_id == new_owner);
        if !has_new_owner {
            store.memberships.push(Membership {
                api_id,
                user_id: new_owner,
                role_name: PRIMARY_OWNER.to_string(),
                created_at: now,
            });
        }
        Ok(())
    }

    async fn find_subscription(&self, id: Uuid) -> RepositoryResult<Option<Subscription>> {
        Ok(self.store.read().await.subscriptions.get(&id).cloned())
    }

    async fn search_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> RepositoryResult<Vec<Subscription>> {
        let store = self.store.read().await;
        let mut subscriptions: Vec<Subscription> = store
            .subscriptions
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(subscriptions)
    }

    async fn create_subscription(
        &self,
        subscription: Subscription,
    ) -> RepositoryResult<Subscription> {
        self.store
            .write()
            .await
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
    ) -> RepositoryResult<Subscription> {
        let mut store = self.store.write().await;
        match store.subscriptions.get_mut(&subscription.id) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(subscription.clone())
            }
            None => Err(RepositoryError::Missing {
                entity: "Subscription",
                id: subscription.id.to_string(),
            }),
        }
    }

    async fn find_metadata_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Metadata>> {
        let store = self.store.read().await;
        let mut metadata: Vec<Metadata> = store
            .metadata
            .iter()
            .filter(|m| m.api_id == api_id)
            .cloned()
            .collect();
        metadata.sort_by(|a, b| a.name.cmp(&b.name).then(a.key.cmp(&b.key)));
        Ok(metadata)
    }

    async fn find_metadata(&self, api_id: Uuid, key: &str) -> RepositoryResult<Option<Metadata>> {
        let store = self.store.read().await;
        Ok(store
            .metadata
            .iter()
            .find(|m| m.api_id == api_id && m.key == key)
            .cloned())
    }

    async fn create_metadata(&self, metadata: Metadata) -> RepositoryResult<Metadata> {
        self.store.write().await.metadata.push(metadata.clone());
        Ok(metadata)
    }

    async fn update_metadata(&self, metadata: &Metadata) -> RepositoryResult<Metadata> {
        let mut store = self.store.write().await;
        match store
            .metadata
            .iter_mut()
            .find(|m| m.api_id == metadata.api_id && m.key == metadata.key)
        {
            Some(existing) => {
                *existing = metadata.clone();
                Ok(metadata.clone())
            }
            None => Err(RepositoryError::Missing {
                entity: "Metadata",
                id: metadata.key.clone(),
            }),
        }
    }

    async fn delete_metadata(&self, api_id: Uuid, key: &str) -> RepositoryResult<bool> {
        let mut store = self.store.write().await;
        let before = store.metadata.len();
        store
            .metadata
            .retain(|m| !(m.api_id == api_id && m.key == key));
        Ok(store.metadata.len() < before)
    }

    async fn count_connection_logs(&self, query: &LogQuery) -> RepositoryResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .connection_logs
            .iter()
            .filter(|log| query.matches(log))
            .count() as i64)
    }

    async fn search_connection_logs(
        &self,
        query: &LogQuery,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<ConnectionLog>> {
        let store = self.store.read().await;
        let mut logs: Vec<ConnectionLog> = store
            .connection_logs
            .iter()
            .filter(|log| query.matches(log))
            .cloned()
            .collect();
        logs.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(a.request_id.cmp(&b.request_id))
        });
        Ok(window(logs, offset, limit))
    }

    async fn find_connection_log_detail(
        &self,
        api_id: Uuid,
        request_id: &str,
    ) -> RepositoryResult<Option<ConnectionLogDetail>> {
        let store = self.store.read().await;
        Ok(store
            .log_details
            .iter()
            .find(|d| d.api_id == api_id && d.request_id == request_id)
            .cloned())
    }

    async fn count_message_logs(&self, api_id: Uuid, request_id: &str) -> RepositoryResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .message_logs
            .iter()
            .filter(|m| m.api_id == api_id && m.request_id == request_id)
            .count() as i64)
    }

    async fn search_message_logs(
        &self,
        api_id: Uuid,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<MessageLog>> {
        let store = self.store.read().await;
        let mut logs: Vec<MessageLog> = store
            .message_logs
            .iter()
            .filter(|m| m.api_id == api_id && m.request_id == request_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(window(logs, offset, limit))
    }
}
