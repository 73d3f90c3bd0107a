use apim_console::{
    models::{
        Api, ApiLifecycleState, ApiState, ConnectionLog, DEFAULT_ENVIRONMENT_ID, DefinitionVersion,
        Membership, Metadata, MetadataFormat, PRIMARY_OWNER, Plan, PlanMode, PlanSecurityType,
        PlanStatus, PlanValidation, RoleScope, Subscription, SubscriptionStatus, Visibility,
    },
    repository::{ApiQuery, LogQuery, PostgresRepository, Repository, SubscriptionQuery},
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

// These tests run against a real database:
// DATABASE_URL=postgres://... cargo test -- --ignored

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(pool: &PgPool, display_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, display_name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{id}@test.com"))
        .bind(display_name)
        .execute(pool)
        .await
        .expect("Failed to insert test user");
    id
}

async fn create_test_application(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO applications (id, environment_id, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(DEFAULT_ENVIRONMENT_ID)
        .bind("Test application")
        .execute(pool)
        .await
        .expect("Failed to insert test application");
    id
}

fn new_api(name: &str) -> Api {
    let now = Utc::now();
    Api {
        id: Uuid::new_v4(),
        environment_id: DEFAULT_ENVIRONMENT_ID.to_string(),
        name: name.to_string(),
        api_version: "1.0".to_string(),
        description: None,
        definition_version: DefinitionVersion::V4,
        state: ApiState::Stopped,
        lifecycle_state: ApiLifecycleState::Created,
        visibility: Visibility::Private,
        created_at: now,
        updated_at: now,
    }
}

async fn create_owned_api(repo: &PostgresRepository, owner: Uuid, name: &str) -> Api {
    let api = new_api(name);
    let membership = Membership {
        api_id: api.id,
        user_id: owner,
        role_name: PRIMARY_OWNER.to_string(),
        created_at: Utc::now(),
    };
    repo.create_api(api, membership)
        .await
        .expect("Failed to create API")
}

fn new_plan(api_id: Uuid, order: i32) -> Plan {
    let now = Utc::now();
    Plan {
        id: Uuid::new_v4(),
        api_id,
        name: format!("Plan {order}"),
        description: None,
        status: PlanStatus::Published,
        security: Some(PlanSecurityType::ApiKey),
        mode: PlanMode::Standard,
        validation: PlanValidation::Manual,
        characteristics: vec!["fast".to_string()],
        order,
        created_at: now,
        updated_at: now,
        published_at: Some(now),
        closed_at: None,
    }
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_default_environment_and_roles_are_seeded() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let environment = repo.find_environment(DEFAULT_ENVIRONMENT_ID).await.unwrap();
    assert!(environment.is_some());

    let owner = repo
        .find_role(RoleScope::Api, PRIMARY_OWNER)
        .await
        .unwrap()
        .expect("PRIMARY_OWNER role seeded");
    assert_eq!(owner.permissions["LOG"], "CRUD");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_api_lifecycle_and_membership() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "Owner").await;
    let member = create_test_user(&ctx.pool, "Member").await;

    let mut api = create_owned_api(&repo, owner, &format!("Repo API {}", Uuid::new_v4())).await;

    let found = repo.find_api(api.id).await.unwrap().expect("API stored");
    assert_eq!(found.name, api.name);
    assert_eq!(found.state, ApiState::Stopped);

    api.state = ApiState::Started;
    let updated = repo.update_api(&api).await.unwrap();
    assert_eq!(updated.state, ApiState::Started);

    let by_name = repo
        .search_apis(
            DEFAULT_ENVIRONMENT_ID,
            &ApiQuery {
                name: Some(api.name.to_lowercase()),
                ids: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);

    repo.save_membership(&Membership {
        api_id: api.id,
        user_id: member,
        role_name: "USER".to_string(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();
    assert_eq!(repo.find_memberships_by_api(api.id).await.unwrap().len(), 2);
    assert_eq!(repo.find_api_ids_by_member(member).await.unwrap(), vec![api.id]);

    repo.transfer_ownership(api.id, owner, member, "OWNER")
        .await
        .unwrap();
    let new_owner = repo.find_membership(api.id, member).await.unwrap().unwrap();
    let previous = repo.find_membership(api.id, owner).await.unwrap().unwrap();
    assert_eq!(new_owner.role_name, PRIMARY_OWNER);
    assert_eq!(previous.role_name, "OWNER");

    assert!(repo.delete_api(api.id).await.unwrap());
    assert!(repo.find_api(api.id).await.unwrap().is_none());
    assert!(repo.find_membership(api.id, member).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_plans_are_ordered_and_decoded() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "Owner").await;
    let api = create_owned_api(&repo, owner, "Plans API").await;

    let second = repo.create_plan(new_plan(api.id, 2)).await.unwrap();
    let mut push = new_plan(api.id, 1);
    push.mode = PlanMode::Push;
    push.security = None;
    let first = repo.create_plan(push).await.unwrap();

    let plans = repo.find_plans_by_api(api.id).await.unwrap();
    assert_eq!(
        plans.iter().map(|plan| plan.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
    assert_eq!(plans[0].security, None);
    assert_eq!(plans[1].characteristics, vec!["fast".to_string()]);

    assert!(repo.delete_plan(second.id).await.unwrap());
    assert!(!repo.delete_plan(second.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_subscription_search_filters_by_status() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "Owner").await;
    let application_id = create_test_application(&ctx.pool).await;
    let api = create_owned_api(&repo, owner, "Subscriptions API").await;
    let plan = repo.create_plan(new_plan(api.id, 1)).await.unwrap();

    let now = Utc::now();
    let mut subscription = repo
        .create_subscription(Subscription {
            id: Uuid::new_v4(),
            api_id: api.id,
            plan_id: plan.id,
            application_id,
            status: SubscriptionStatus::Pending,
            request: Some("please".to_string()),
            reason: None,
            subscribed_by: owner,
            processed_by: None,
            starting_at: None,
            ending_at: None,
            processed_at: None,
            paused_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let pending = SubscriptionQuery {
        statuses: vec![SubscriptionStatus::Pending],
        ..SubscriptionQuery::for_api(api.id)
    };
    assert_eq!(repo.search_subscriptions(&pending).await.unwrap().len(), 1);

    subscription.status = SubscriptionStatus::Accepted;
    subscription.processed_by = Some(owner);
    subscription.processed_at = Some(Utc::now());
    repo.update_subscription(&subscription).await.unwrap();

    assert!(repo.search_subscriptions(&pending).await.unwrap().is_empty());
    let stored = repo.find_subscription(subscription.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Accepted);
    assert_eq!(stored.processed_by, Some(owner));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_close_plan_rolls_back_on_missing_subscription() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "Owner").await;
    let application_id = create_test_application(&ctx.pool).await;
    let api = create_owned_api(&repo, owner, "Close API").await;
    let plan = repo.create_plan(new_plan(api.id, 1)).await.unwrap();

    let now = Utc::now();
    let subscription = repo
        .create_subscription(Subscription {
            id: Uuid::new_v4(),
            api_id: api.id,
            plan_id: plan.id,
            application_id,
            status: SubscriptionStatus::Accepted,
            request: None,
            reason: None,
            subscribed_by: owner,
            processed_by: Some(owner),
            starting_at: None,
            ending_at: None,
            processed_at: Some(now),
            paused_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let mut closed_plan = plan.clone();
    closed_plan.status = PlanStatus::Closed;
    closed_plan.closed_at = Some(Utc::now());
    let mut closed = subscription.clone();
    closed.status = SubscriptionStatus::Closed;
    closed.closed_at = Some(Utc::now());
    let mut gone = closed.clone();
    gone.id = Uuid::new_v4();

    assert!(repo.close_plan(&closed_plan, &[closed.clone(), gone]).await.is_err());
    assert_eq!(
        repo.find_subscription(subscription.id).await.unwrap().unwrap().status,
        SubscriptionStatus::Accepted
    );
    assert_eq!(
        repo.find_plan(plan.id).await.unwrap().unwrap().status,
        PlanStatus::Published
    );

    let stored = repo.close_plan(&closed_plan, &[closed]).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Closed);
    assert_eq!(
        repo.find_subscription(subscription.id).await.unwrap().unwrap().status,
        SubscriptionStatus::Closed
    );
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_metadata_crud() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "Owner").await;
    let api = create_owned_api(&repo, owner, "Metadata API").await;

    let now = Utc::now();
    let mut metadata = repo
        .create_metadata(Metadata {
            api_id: api.id,
            key: "team".to_string(),
            name: "Team".to_string(),
            value: "core".to_string(),
            format: MetadataFormat::String,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    metadata.value = "platform".to_string();
    repo.update_metadata(&metadata).await.unwrap();
    let stored = repo.find_metadata(api.id, "team").await.unwrap().unwrap();
    assert_eq!(stored.value, "platform");
    assert_eq!(repo.find_metadata_by_api(api.id).await.unwrap().len(), 1);

    assert!(repo.delete_metadata(api.id, "team").await.unwrap());
    assert!(repo.find_metadata(api.id, "team").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_connection_log_window() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let api_id = Uuid::new_v4();
    let start = Utc::now() - Duration::hours(1);

    for (index, method) in ["GET", "POST", "GET"].into_iter().enumerate() {
        sqlx::query(
            "INSERT INTO connection_logs (request_id, api_id, timestamp, method, status, uri) \
             VALUES ($1, $2, $3, $4, 200, '/')",
        )
        .bind(format!("req-{index}"))
        .bind(api_id)
        .bind(start + Duration::minutes(index as i64))
        .bind(method)
        .execute(&ctx.pool)
        .await
        .unwrap();
    }

    let gets = LogQuery {
        methods: vec!["GET".to_string()],
        ..LogQuery::for_api(api_id)
    };
    assert_eq!(repo.count_connection_logs(&gets).await.unwrap(), 2);

    let newest: Vec<ConnectionLog> = repo
        .search_connection_logs(&LogQuery::for_api(api_id), 0, 2)
        .await
        .unwrap();
    assert_eq!(
        newest.iter().map(|log| log.request_id.as_str()).collect::<Vec<_>>(),
        vec!["req-2", "req-1"]
    );
}
