#![allow(dead_code)]

use apim_console::{
    AppConfig, AppState, InMemoryRepository, RepositoryState, create_router,
    models::{Application, DEFAULT_ENVIRONMENT_ID, ENVIRONMENT_ADMIN, ENVIRONMENT_USER, User},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ENV: &str = DEFAULT_ENVIRONMENT_ID;

/// A router over a seeded in-memory repository.
///
/// * `admin`: environment `ADMIN`, sees every API.
/// * `alice`: environment `USER`; creates APIs and becomes their primary owner.
/// * `bob`: environment `USER`; used as a member or a subscriber.
/// * `mallory`: environment `USER`, member of nothing.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub admin: User,
    pub alice: User,
    pub bob: User,
    pub mallory: User,
    pub application: Application,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

fn user(display_name: &str, role: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", display_name.to_lowercase()),
        display_name: display_name.to_string(),
        environment_role: role.to_string(),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let admin = repo.add_user(user("Admin", ENVIRONMENT_ADMIN)).await;
        let alice = repo.add_user(user("Alice", ENVIRONMENT_USER)).await;
        let bob = repo.add_user(user("Bob", ENVIRONMENT_USER)).await;
        let mallory = repo.add_user(user("Mallory", ENVIRONMENT_USER)).await;
        let application = repo
            .add_application(Application {
                id: Uuid::new_v4(),
                environment_id: ENV.to_string(),
                name: "Mobile app".to_string(),
                description: Some("The iOS client".to_string()),
                created_at: Utc::now(),
            })
            .await;

        let state = AppState {
            repo: repo.clone() as RepositoryState,
            config,
        };

        TestApp {
            router: create_router(state),
            repo,
            admin,
            alice,
            bob,
            mallory,
            application,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        as_user: Option<&User>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = as_user {
            builder = builder.header("x-user-id", user.id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }

    pub async fn get(&self, uri: &str, as_user: &User) -> TestResponse {
        self.send(Method::GET, uri, Some(as_user), None).await
    }

    pub async fn post(&self, uri: &str, as_user: &User, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(as_user), Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str, as_user: &User) -> TestResponse {
        self.send(Method::POST, uri, Some(as_user), None).await
    }

    pub async fn put(&self, uri: &str, as_user: &User, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(as_user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, as_user: &User) -> TestResponse {
        self.send(Method::DELETE, uri, Some(as_user), None).await
    }

    /// Creates an API owned by `owner` and returns its id.
    pub async fn create_api(&self, owner: &User, name: &str) -> Uuid {
        let response = self
            .post(
                &format!("/environments/{ENV}/apis"),
                owner,
                serde_json::json!({ "name": name, "apiVersion": "1.0" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        id_of(&response.body)
    }

    /// Creates and publishes a plan, returning its id.
    pub async fn published_plan(&self, owner: &User, api_id: Uuid, validation: &str) -> Uuid {
        let response = self
            .post(
                &format!("/environments/{ENV}/apis/{api_id}/plans"),
                owner,
                serde_json::json!({
                    "name": format!("{validation} plan"),
                    "security": "API_KEY",
                    "validation": validation,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        let plan_id = id_of(&response.body);

        let published = self
            .post_empty(
                &format!("/environments/{ENV}/apis/{api_id}/plans/{plan_id}/_publish"),
                owner,
            )
            .await;
        assert_eq!(published.status, StatusCode::OK, "{}", published.text);
        plan_id
    }

    /// Subscribes the seeded application to `plan_id`, returning the subscription id.
    pub async fn subscribe(&self, as_user: &User, api_id: Uuid, plan_id: Uuid) -> Uuid {
        let response = self
            .post(
                &format!("/environments/{ENV}/apis/{api_id}/subscriptions"),
                as_user,
                serde_json::json!({
                    "planId": plan_id,
                    "applicationId": self.application.id,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        id_of(&response.body)
    }
}

pub fn id_of(body: &Value) -> Uuid {
    body["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("response body carries an id")
}
