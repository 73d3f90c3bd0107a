use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{ApiQuery, LogQuery, Repository, RepositoryResult, SubscriptionQuery};
use crate::{
    error::RepositoryError,
    models::{
        Api, Application, ConnectionLog, ConnectionLogDetail, Environment, Membership, MessageLog,
        Metadata, PRIMARY_OWNER, Plan, Role, RoleScope, Subscription, User,
    },
};

const API_COLUMNS: &str = "id, environment_id, name, api_version, description, \
    definition_version, state, lifecycle_state, visibility, created_at, updated_at";

const PLAN_COLUMNS: &str = r#"id, api_id, name, description, status, security, mode, validation,
    characteristics, "order", created_at, updated_at, published_at, closed_at"#;

const SUBSCRIPTION_COLUMNS: &str = "id, api_id, plan_id, application_id, status, request, \
    reason, subscribed_by, processed_by, starting_at, ending_at, processed_at, paused_at, \
    closed_at, created_at, updated_at";

const METADATA_COLUMNS: &str = "api_id, key, name, value, format, created_at, updated_at";

const LOG_COLUMNS: &str = "request_id, api_id, timestamp, application_id, plan_id, \
    client_identifier, transaction_id, method, status, uri, request_ended, \
    gateway_response_time_ms";

const MESSAGE_LOG_COLUMNS: &str = "id, api_id, request_id, timestamp, operation, \
    connector_type, connector_id, message_id, payload, headers, metadata";

/// Escapes `LIKE` wildcards so user input is matched literally.
fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_log_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a LogQuery) {
    builder.push(" WHERE api_id = ");
    builder.push_bind(query.api_id);

    if let Some(from) = query.from {
        builder.push(" AND timestamp >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND timestamp <= ");
        builder.push_bind(to);
    }
    if !query.application_ids.is_empty() {
        builder.push(" AND application_id = ANY(");
        builder.push_bind(&query.application_ids);
        builder.push(")");
    }
    if !query.plan_ids.is_empty() {
        builder.push(" AND plan_id = ANY(");
        builder.push_bind(&query.plan_ids);
        builder.push(")");
    }
    if !query.methods.is_empty() {
        builder.push(" AND method = ANY(");
        builder.push_bind(&query.methods);
        builder.push(")");
    }
    if !query.statuses.is_empty() {
        builder.push(" AND status = ANY(");
        builder.push_bind(&query.statuses);
        builder.push(")");
    }
}

/// PostgresRepository
///
/// The [`Repository`] implementation backed by PostgreSQL. The schema lives in
/// `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_environment(&self, id: &str) -> RepositoryResult<Option<Environment>> {
        let environment = sqlx::query_as::<_, Environment>(
            "SELECT id, organization_id, name FROM environments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(environment)
    }

    async fn find_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, environment_role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_users(&self, ids: &[Uuid]) -> RepositoryResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, environment_role FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_role(&self, scope: RoleScope, name: &str) -> RepositoryResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, scope, name, permissions FROM roles WHERE scope = $1 AND name = $2",
        )
        .bind(scope.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn find_application(&self, id: Uuid) -> RepositoryResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            "SELECT id, environment_id, name, description, created_at FROM applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn find_applications(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(
            "SELECT id, environment_id, name, description, created_at FROM applications WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn find_api(&self, id: Uuid) -> RepositoryResult<Option<Api>> {
        let api = sqlx::query_as::<_, Api>(&format!("SELECT {API_COLUMNS} FROM apis WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(api)
    }

    /// search_apis
    ///
    /// Filters are appended with `QueryBuilder` so every user value is bound.
    async fn search_apis(
        &self,
        environment_id: &str,
        query: &ApiQuery,
    ) -> RepositoryResult<Vec<Api>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {API_COLUMNS} FROM apis WHERE environment_id = "));
        builder.push_bind(environment_id);

        if let Some(ids) = &query.ids {
            builder.push(" AND id = ANY(");
            builder.push_bind(ids);
            builder.push(")");
        }
        if let Some(name) = &query.name {
            builder.push(" AND name ILIKE ");
            builder.push_bind(like_pattern(name));
        }
        builder.push(" ORDER BY lower(name), id");

        let apis = builder.build_query_as::<Api>().fetch_all(&self.pool).await?;
        Ok(apis)
    }

    async fn create_api(&self, api: Api, primary_owner: Membership) -> RepositoryResult<Api> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Api>(&format!(
            "INSERT INTO apis ({API_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {API_COLUMNS}"
        ))
        .bind(api.id)
        .bind(&api.environment_id)
        .bind(&api.name)
        .bind(&api.api_version)
        .bind(&api.description)
        .bind(api.definition_version.as_str())
        .bind(api.state.as_str())
        .bind(api.lifecycle_state.as_str())
        .bind(api.visibility.as_str())
        .bind(api.created_at)
        .bind(api.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO memberships (api_id, user_id, role_name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(primary_owner.api_id)
        .bind(primary_owner.user_id)
        .bind(&primary_owner.role_name)
        .bind(primary_owner.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_api(&self, api: &Api) -> RepositoryResult<Api> {
        sqlx::query_as::<_, Api>(&format!(
            "UPDATE apis SET name = $2, api_version = $3, description = $4, state = $5, \
             lifecycle_state = $6, visibility = $7, updated_at = $8 \
             WHERE id = $1 RETURNING {API_COLUMNS}"
        ))
        .bind(api.id)
        .bind(&api.name)
        .bind(&api.api_version)
        .bind(&api.description)
        .bind(api.state.as_str())
        .bind(api.lifecycle_state.as_str())
        .bind(api.visibility.as_str())
        .bind(api.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Missing {
            entity: "Api",
            id: api.id.to_string(),
        })
    }

    /// delete_api
    ///
    /// Plans, subscriptions, memberships and metadata go with the API through
    /// `ON DELETE CASCADE`.
    async fn delete_api(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM apis WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_plan(&self, id: Uuid) -> RepositoryResult<Option<Plan>> {
        let plan =
            sqlx::query_as::<_, Plan>(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(plan)
    }

    async fn find_plans_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Plan>> {
        let plans = sqlx::query_as::<_, Plan>(&format!(
            r#"SELECT {PLAN_COLUMNS} FROM plans WHERE api_id = $1 ORDER BY "order", created_at"#
        ))
        .bind(api_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(plans)
    }

    async fn find_plans(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Plan>> {
        let plans = sqlx::query_as::<_, Plan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(plans)
    }

    async fn create_plan(&self, plan: Plan) -> RepositoryResult<Plan> {
        let created = sqlx::query_as::<_, Plan>(&format!(
            "INSERT INTO plans ({PLAN_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(plan.id)
        .bind(plan.api_id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.status.as_str())
        .bind(plan.security.map(|s| s.as_str()))
        .bind(plan.mode.as_str())
        .bind(plan.validation.as_str())
        .bind(&plan.characteristics)
        .bind(plan.order)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .bind(plan.published_at)
        .bind(plan.closed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_plan(&self, plan: &Plan) -> RepositoryResult<Plan> {
        sqlx::query_as::<_, Plan>(&format!(
            r#"UPDATE plans SET name = $2, description = $3, status = $4, validation = $5,
               characteristics = $6, "order" = $7, updated_at = $8, published_at = $9,
               closed_at = $10
               WHERE id = $1 RETURNING {PLAN_COLUMNS}"#
        ))
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.status.as_str())
        .bind(plan.validation.as_str())
        .bind(&plan.characteristics)
        .bind(plan.order)
        .bind(plan.updated_at)
        .bind(plan.published_at)
        .bind(plan.closed_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Missing {
            entity: "Plan",
            id: plan.id.to_string(),
        })
    }

    async fn close_plan(
        &self,
        plan: &Plan,
        subscriptions: &[Subscription],
    ) -> RepositoryResult<Plan> {
        let mut tx = self.pool.begin().await?;

        for subscription in subscriptions {
            let result = sqlx::query(
                "UPDATE subscriptions SET status = $2, reason = $3, processed_by = $4, \
                 processed_at = $5, paused_at = $6, closed_at = $7, updated_at = $8 \
                 WHERE id = $1",
            )
            .bind(subscription.id)
            .bind(subscription.status.as_str())
            .bind(&subscription.reason)
            .bind(subscription.processed_by)
            .bind(subscription.processed_at)
            .bind(subscription.paused_at)
            .bind(subscription.closed_at)
            .bind(subscription.updated_at)
            .execute(&mut *tx)
            .await?;

            // Dropping `tx` rolls back the rows already written.
            if result.rows_affected() == 0 {
                return Err(RepositoryError::Missing {
                    entity: "Subscription",
                    id: subscription.id.to_string(),
                });
            }
        }

        let closed = sqlx::query_as::<_, Plan>(&format!(
            "UPDATE plans SET status = $2, updated_at = $3, closed_at = $4 \
             WHERE id = $1 RETURNING {PLAN_COLUMNS}"
        ))
        .bind(plan.id)
        .bind(plan.status.as_str())
        .bind(plan.updated_at)
        .bind(plan.closed_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::Missing {
            entity: "Plan",
            id: plan.id.to_string(),
        })?;

        tx.commit().await?;
        Ok(closed)
    }

    async fn delete_plan(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_membership(
        &self,
        api_id: Uuid,
        user_id: Uuid,
    ) -> RepositoryResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT api_id, user_id, role_name, created_at FROM memberships \
             WHERE api_id = $1 AND user_id = $2",
        )
        .bind(api_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn find_memberships_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(
            "SELECT api_id, user_id, role_name, created_at FROM memberships WHERE api_id = $1",
        )
        .bind(api_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(memberships)
    }

    async fn find_api_ids_by_member(&self, user_id: Uuid) -> RepositoryResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT api_id FROM memberships WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn save_membership(&self, membership: &Membership) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO memberships (api_id, user_id, role_name, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (api_id, user_id) DO UPDATE SET role_name = EXCLUDED.role_name",
        )
        .bind(membership.api_id)
        .bind(membership.user_id)
        .bind(&membership.role_name)
        .bind(membership.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_membership(&self, api_id: Uuid, user_id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE api_id = $1 AND user_id = $2")
            .bind(api_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transfer_ownership(
        &self,
        api_id: Uuid,
        previous_owner: Uuid,
        new_owner: Uuid,
        previous_owner_role: &str,
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE memberships SET role_name = $3 WHERE api_id = $1 AND user_id = $2")
            .bind(api_id)
            .bind(previous_owner)
            .bind(previous_owner_role)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO memberships (api_id, user_id, role_name, created_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (api_id, user_id) DO UPDATE SET role_name = EXCLUDED.role_name",
        )
        .bind(api_id)
        .bind(new_owner)
        .bind(PRIMARY_OWNER)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_subscription(&self, id: Uuid) -> RepositoryResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn search_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> RepositoryResult<Vec<Subscription>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE api_id = "
        ));
        builder.push_bind(query.api_id);

        if !query.application_ids.is_empty() {
            builder.push(" AND application_id = ANY(");
            builder.push_bind(&query.application_ids);
            builder.push(")");
        }
        if !query.plan_ids.is_empty() {
            builder.push(" AND plan_id = ANY(");
            builder.push_bind(&query.plan_ids);
            builder.push(")");
        }
        if !query.statuses.is_empty() {
            let statuses: Vec<String> = query.statuses.iter().map(|s| s.to_string()).collect();
            builder.push(" AND status = ANY(");
            builder.push_bind(statuses);
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC, id");

        let subscriptions = builder
            .build_query_as::<Subscription>()
            .fetch_all(&self.pool)
            .await?;
        Ok(subscriptions)
    }

    async fn create_subscription(
        &self,
        subscription: Subscription,
    ) -> RepositoryResult<Subscription> {
        let created = sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(subscription.id)
        .bind(subscription.api_id)
        .bind(subscription.plan_id)
        .bind(subscription.application_id)
        .bind(subscription.status.as_str())
        .bind(&subscription.request)
        .bind(&subscription.reason)
        .bind(subscription.subscribed_by)
        .bind(subscription.processed_by)
        .bind(subscription.starting_at)
        .bind(subscription.ending_at)
        .bind(subscription.processed_at)
        .bind(subscription.paused_at)
        .bind(subscription.closed_at)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
    ) -> RepositoryResult<Subscription> {
        sqlx::query_as::<_, Subscription>(&format!(
            "UPDATE subscriptions SET status = $2, reason = $3, processed_by = $4, \
             starting_at = $5, ending_at = $6, processed_at = $7, paused_at = $8, \
             closed_at = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(subscription.id)
        .bind(subscription.status.as_str())
        .bind(&subscription.reason)
        .bind(subscription.processed_by)
        .bind(subscription.starting_at)
        .bind(subscription.ending_at)
        .bind(subscription.processed_at)
        .bind(subscription.paused_at)
        .bind(subscription.closed_at)
        .bind(subscription.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Missing {
            entity: "Subscription",
            id: subscription.id.to_string(),
        })
    }

    async fn find_metadata_by_api(&self, api_id: Uuid) -> RepositoryResult<Vec<Metadata>> {
        let metadata = sqlx::query_as::<_, Metadata>(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata WHERE api_id = $1 ORDER BY name, key"
        ))
        .bind(api_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(metadata)
    }

    async fn find_metadata(&self, api_id: Uuid, key: &str) -> RepositoryResult<Option<Metadata>> {
        let metadata = sqlx::query_as::<_, Metadata>(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata WHERE api_id = $1 AND key = $2"
        ))
        .bind(api_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(metadata)
    }

    async fn create_metadata(&self, metadata: Metadata) -> RepositoryResult<Metadata> {
        let created = sqlx::query_as::<_, Metadata>(&format!(
            "INSERT INTO metadata ({METADATA_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {METADATA_COLUMNS}"
        ))
        .bind(metadata.api_id)
        .bind(&metadata.key)
        .bind(&metadata.name)
        .bind(&metadata.value)
        .bind(metadata.format.as_str())
        .bind(metadata.created_at)
        .bind(metadata.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_metadata(&self, metadata: &Metadata) -> RepositoryResult<Metadata> {
        sqlx::query_as::<_, Metadata>(&format!(
            "UPDATE metadata SET name = $3, value = $4, format = $5, updated_at = $6 \
             WHERE api_id = $1 AND key = $2 RETURNING {METADATA_COLUMNS}"
        ))
        .bind(metadata.api_id)
        .bind(&metadata.key)
        .bind(&metadata.name)
        .bind(&metadata.value)
        .bind(metadata.format.as_str())
        .bind(metadata.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Missing {
            entity: "Metadata",
            id: metadata.key.clone(),
        })
    }

    async fn delete_metadata(&self, api_id: Uuid, key: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM metadata WHERE api_id = $1 AND key = $2")
            .bind(api_id)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_connection_logs(&self, query: &LogQuery) -> RepositoryResult<i64> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM connection_logs");
        push_log_filters(&mut builder, query);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn search_connection_logs(
        &self,
        query: &LogQuery,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<ConnectionLog>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LOG_COLUMNS} FROM connection_logs"));
        push_log_filters(&mut builder, query);
        builder.push(" ORDER BY timestamp DESC, request_id LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let logs = builder
            .build_query_as::<ConnectionLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    async fn find_connection_log_detail(
        &self,
        api_id: Uuid,
        request_id: &str,
    ) -> RepositoryResult<Option<ConnectionLogDetail>> {
        let detail = sqlx::query_as::<_, ConnectionLogDetail>(
            "SELECT request_id, api_id, timestamp, client_identifier, request_ended, \
             entrypoint_request, entrypoint_response, endpoint_request, endpoint_response \
             FROM connection_log_details WHERE api_id = $1 AND request_id = $2",
        )
        .bind(api_id)
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(detail)
    }

    async fn count_message_logs(&self, api_id: Uuid, request_id: &str) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM message_logs WHERE api_id = $1 AND request_id = $2",
        )
        .bind(api_id)
        .bind(request_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn search_message_logs(
        &self,
        api_id: Uuid,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<Vec<MessageLog>> {
        let logs = sqlx::query_as::<_, MessageLog>(&format!(
            "SELECT {MESSAGE_LOG_COLUMNS} FROM message_logs \
             WHERE api_id = $1 AND request_id = $2 \
             ORDER BY timestamp, id LIMIT $3 OFFSET $4"
        ))
        .bind(api_id)
        .bind(request_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}
