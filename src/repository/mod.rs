use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::RepositoryError,
    models::{
        Api, Application, ConnectionLog, ConnectionLogDetail, Environment, Membership, MessageLog,
        Metadata, Plan, Role, RoleScope, Subscription, SubscriptionStatus, User,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// ApiQuery
///
/// Filters for [`Repository::search_apis`]. `ids: Some(vec![])` matches nothing.
#[derive(Debug, Clone, Default)]
pub struct ApiQuery {
    pub name: Option<String>,
    pub ids: Option<Vec<Uuid>>,
}

/// SubscriptionQuery
///
/// Filters for [`Repository::search_subscriptions`]. Empty lists do not filter.
#[derive(Debug, Clone)]
pub struct SubscriptionQuery {
    pub api_id: Uuid,
    pub application_ids: Vec<Uuid>,
    pub plan_ids: Vec<Uuid>,
    pub statuses: Vec<SubscriptionStatus>,
}

impl SubscriptionQuery {
    pub fn for_api(api_id: Uuid) -> Self {
        Self {
            api_id,
            application_ids: vec![],
            plan_ids: vec![],
            statuses: vec![],
        }
    }

    pub fn matches(&self, subscription: &Subscription) -> bool {
        subscription.api_id == self.api_id
            && (self.application_ids.is_empty()
                || self.application_ids.contains(&subscription.application_id))
            && (self.plan_ids.is_empty() || self.plan_ids.contains(&subscription.plan_id))
            && (self.statuses.is_empty() || self.statuses.contains(&subscription.status))
    }
}

/// LogQuery
///
/// Filters for connection log searches. Empty lists do not filter; `from` and
/// `to` are inclusive.
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub api_id: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub application_ids: Vec<Uuid>,
    pub plan_ids: Vec<Uuid>,
    pub methods: Vec<String>,
    pub statuses: Vec<i32>,
}

impl LogQuery {
    pub fn for_api(api_id: Uuid) -> Self {
        Self {
            api_id,
            from: None,
            to: None,
            application_ids: vec![],
            plan_ids: vec![],
            methods: vec![],
            statuses: vec![],
        }
    }

    pub fn matches(&self, log: &ConnectionLog) -> bool {
        log.api_id == self.api_id
            && self.from.is_none_or(|from| log.timestamp >= from)
            && self.to.is_none_or(|to| log.timestamp <= to)
            && (self.application_ids.is_empty()
                || log
                    .application_id
                    .is_some_and(|id| self.application_ids.contains(&id)))
            && (self.plan_ids.is_empty()
                || log.plan_id.is_some_and(|id| self.plan_ids.contains(&id)))
            && (self.methods.is_empty() || self.methods.contains(&log.method))
            && (self.statuses.is_empty() || self.statuses.contains(&log.status))
    }
}

/// Repository Trait
///
/// The persistence contract the handlers depend on. Implemented by
/// [`PostgresRepository`] and [`InMemoryRepository`]; shared as
/// `Arc<dyn Repository>`, hence `Send + Sync` and `async_trait`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Environments, Users & Roles ---
    async fn find_environment(&self, id: &str) -> RepositoryResult<Option<Environment>>;
    async fn find_user(&self, id: Uuid) -> RepositoryResult<Option<User>>;
    async fn find_users(&self, ids: &[Uuid]) -> RepositoryResult<Vec<User>>;
    async fn find_role(&self, scope: RoleScope, name: &str) -> RepositoryResult<Option<Role>>;

    // --- Applications ---
    async fn find_application(&self, id: Uuid) -> RepositoryResult<Option<Application>>;
    async fn find_applications(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Application>>;

    // --- APIs ---
    async fn find_api(&self, id: Uuid) -> RepositoryResult<Option<Api>>;
    /// APIs of an environment matching `query`, sorted by name.
    async fn search_apis(&self, environment_id: &str, query: &ApiQuery)
    -> RepositoryResult<Vec<Api>>;
    /// Stores the API together with its primary owner membership.
    async fn create_api(&self, api: Api, primary_owner: Membership) -> RepositoryResult<Api>;
    async fn update_api(&self, api: &Api) -> RepositoryResult<Api>;
    /// Deletes the API and everything attached to it.
    async fn delete_api(&self, id: Uuid) -> RepositoryResult<bool>;

    // --- Plans ---
    async fn find_plan(&self, id: Uuid) -> RepositoryResult<Option<Plan>>;
    /// Plans of an API, sorted by `order`.
    async fn find_plans_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Plan>>;
    async fn find_plans(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Plan>>;
    async fn create_plan(&self, plan: Plan) -> RepositoryResult<Plan>;
    async fn update_plan(&self, plan: &Plan) -> RepositoryResult<Plan>;
    /// Saves a closed plan together with the subscriptions closed with it. Either
    /// every row is written or none is.
    async fn close_plan(
        &self,
        plan: &Plan,
        subscriptions: &[Subscription],
    ) -> RepositoryResult<Plan>;
    async fn delete_plan(&self, id: Uuid) -> RepositoryResult<bool>;

    // --- Memberships ---
    async fn find_membership(
        &self,
        api_id: Uuid,
        user_id: Uuid,
    ) -> RepositoryResult<Option<Membership>>;
    async fn find_memberships_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Membership>>;
    async fn find_api_ids_by_member(&self, user_id: Uuid) -> RepositoryResult<Vec<Uuid>>;
    /// Inserts the membership, or replaces the role of an existing one.
    async fn save_membership(&self, membership: &Membership) -> RepositoryResult<()>;
    async fn delete_membership(&self, api_id: Uuid, user_id: Uuid) -> RepositoryResult<bool>;
    /// Makes `new_owner` the primary owner and demotes the current one to `previous_owner_role`.
    async fn transfer_ownership(
        &self,
        api_id: Uuid,
        previous_owner: Uuid,
        new_owner: Uuid,
        previous_owner_role: &str,
    ) -> RepositoryResult<()>;

    // --- Subscriptions ---
    async fn find_subscription(&self, id: Uuid) -> RepositoryResult<Option<Subscription>>;
    /// Subscriptions matching `query`, newest first.
    async fn search_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> RepositoryResult<Vec<Subscription>>;
    async fn create_subscription(&self, subscription: Subscription)
    -> RepositoryResult<Subscription>;
    async fn update_subscription(
        &self,
        subscription: &Subscription,
    ) -> RepositoryResult<Subscription>;

    // --- Metadata ---
    /// Metadata of an API, sorted by name.
    async fn find_metadata_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Metadata>>;
    async fn find_metadata(&self, api_id: Uuid, key: &str) -> RepositoryResult<Option<Metadata>>;
    async fn create_metadata(&self, metadata: Metadata) -> RepositoryResult<Metadata>;
    async fn update_metadata(&self, metadata: &Metadata) -> RepositoryResult<Metadata>;
    async fn delete_metadata(&self, api_id: Uuid, key: &str) -> RepositoryResult<bool>;

    // --- Logs ---
    async fn count_connection_logs(&self, query: &LogQuery) -> RepositoryResult<i64>;
    /// One window of the matching logs, newest first.
    async fn search_connection_logs(
        &self,
        query: &LogQuery,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<ConnectionLog>>;
    async fn find_connection_log_detail(
        &self,
        api_id: Uuid,
        request_id: &str,
    ) -> RepositoryResult<Option<ConnectionLogDetail>>;
    async fn count_message_logs(&self, api_id: Uuid, request_id: &str) -> RepositoryResult<i64>;
    /// One window of a connection's messages, oldest first.
    async fn search_message_logs(
        &self,
        api_id: Uuid,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<MessageLog>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
