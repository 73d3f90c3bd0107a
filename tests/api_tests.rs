use apim_console::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{DEFAULT_ENVIRONMENT_ID, ENVIRONMENT_USER, User},
    repository::RepositoryState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub user: User,
}

/// Serves the router on a random local port, backed by the in-memory repository.
async fn spawn_app() -> TestApp {
    let repo = InMemoryRepository::new();
    let user = repo
        .add_user(User {
            id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
            display_name: "Dev".to_string(),
            environment_role: ENVIRONMENT_USER.to_string(),
        })
        .await;

    let state = AppState {
        repo: Arc::new(repo) as RepositoryState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, user }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert!(Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"]["/environments/{envId}/apis"].is_object());
    assert!(doc["paths"]["/environments/{envId}/apis/{apiId}/subscriptions/_export"].is_object());
}

#[tokio::test]
async fn test_current_user_profile() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let anonymous = client
        .get(format!("{}/user", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 401);

    let response = client
        .get(format!("{}/user", app.address))
        .header("x-user-id", app.user.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["displayName"], "Dev");
    assert_eq!(profile["environmentRole"], "USER");
}

#[tokio::test]
async fn test_api_lifecycle_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let apis_url = format!("{}/environments/{DEFAULT_ENVIRONMENT_ID}/apis", app.address);

    // Create
    let response = client
        .post(&apis_url)
        .header("x-user-id", app.user.id.to_string())
        .json(&json!({ "name": "Petstore", "apiVersion": "1.0" }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 201);
    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let created: Value = response.json().await.unwrap();
    assert_eq!(location, format!("{apis_url}/{}", created["id"].as_str().unwrap()));

    // List: links are absolute since the client sends a Host header.
    let response = client
        .get(format!("{apis_url}?perPage=5"))
        .header("x-user-id", app.user.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["data"][0]["name"], "Petstore");
    assert_eq!(page["links"]["self"], format!("{apis_url}?perPage=5"));
}
