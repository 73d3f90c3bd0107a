mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{ENV, TestApp, id_of};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_create_api_makes_caller_primary_owner() {
    let app = TestApp::new().await;

    let response = app
        .post(
            &format!("/environments/{ENV}/apis"),
            &app.alice,
            json!({ "name": "  Petstore ", "apiVersion": "2.1", "description": "Pets" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let id = id_of(&response.body);
    assert_eq!(
        response.headers[header::LOCATION].to_str().unwrap(),
        format!("/environments/{ENV}/apis/{id}")
    );
    assert_eq!(response.body["name"], "Petstore");
    assert_eq!(response.body["state"], "STOPPED");
    assert_eq!(response.body["lifecycleState"], "CREATED");
    assert_eq!(response.body["definitionVersion"], "V4");
    assert_eq!(response.body["visibility"], "PRIVATE");
    assert_eq!(response.body["primaryOwner"]["id"], app.alice.id.to_string());
}

#[tokio::test]
async fn test_create_api_rejects_blank_name() {
    let app = TestApp::new().await;

    let response = app
        .post(
            &format!("/environments/{ENV}/apis"),
            &app.alice,
            json!({ "name": "   ", "apiVersion": "1.0" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Validation error");
    assert_eq!(response.body["details"][0]["message"], "name must not be blank");
}

#[tokio::test]
async fn test_requests_without_credentials_are_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .send(Method::GET, &format!("/environments/{ENV}/apis"), None, None)
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["httpStatus"], 401);
}

#[tokio::test]
async fn test_unknown_environment_is_not_found() {
    let app = TestApp::new().await;

    let response = app.get("/environments/NOPE/apis", &app.admin).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "Environment [NOPE] cannot be found.");
    assert_eq!(response.body["technicalCode"], "environment.notFound");
    assert_eq!(response.body["parameters"]["environment"], "NOPE");
}

#[tokio::test]
async fn test_list_apis_is_scoped_to_memberships() {
    let app = TestApp::new().await;
    app.create_api(&app.alice, "Orders").await;
    app.create_api(&app.bob, "Billing").await;

    let alice = app.get(&format!("/environments/{ENV}/apis"), &app.alice).await;
    assert_eq!(alice.status, StatusCode::OK);
    assert_eq!(alice.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(alice.body["data"][0]["name"], "Orders");

    let admin = app.get(&format!("/environments/{ENV}/apis"), &app.admin).await;
    let names: Vec<&str> = admin.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|api| api["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Billing", "Orders"]);
    assert_eq!(admin.body["pagination"]["totalCount"], 2);
}

#[tokio::test]
async fn test_empty_list_has_empty_pagination_and_no_links() {
    let app = TestApp::new().await;
    app.create_api(&app.alice, "Orders").await;

    let response = app.get(&format!("/environments/{ENV}/apis"), &app.mallory).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"], json!([]));
    assert_eq!(response.body["pagination"], json!({}));
    assert!(response.body.get("links").is_none());
}

#[tokio::test]
async fn test_list_apis_builds_navigation_links() {
    let app = TestApp::new().await;
    for name in ["A", "B", "C"] {
        app.create_api(&app.alice, name).await;
    }

    let uri = format!("/environments/{ENV}/apis?perPage=1&page=2");
    let response = app.get(&uri, &app.alice).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"][0]["name"], "B");
    assert_eq!(
        response.body["pagination"],
        json!({ "page": 2, "perPage": 1, "pageCount": 3, "pageItemsCount": 1, "totalCount": 3 })
    );

    let links = &response.body["links"];
    assert_eq!(links["self"], uri);
    assert_eq!(links["first"], format!("/environments/{ENV}/apis?perPage=1&page=1"));
    assert_eq!(links["previous"], format!("/environments/{ENV}/apis?perPage=1&page=1"));
    assert_eq!(links["next"], format!("/environments/{ENV}/apis?perPage=1&page=3"));
    assert_eq!(links["last"], format!("/environments/{ENV}/apis?perPage=1&page=3"));
}

#[tokio::test]
async fn test_list_apis_clamps_page_and_rejects_bad_per_page() {
    let app = TestApp::new().await;
    app.create_api(&app.alice, "A").await;
    app.create_api(&app.alice, "B").await;

    let clamped = app
        .get(&format!("/environments/{ENV}/apis?page=9&perPage=1"), &app.alice)
        .await;
    assert_eq!(clamped.status, StatusCode::OK);
    assert_eq!(clamped.body["pagination"]["page"], 2);
    assert_eq!(clamped.body["data"][0]["name"], "B");
    assert!(clamped.body["links"].get("next").is_none());

    let too_large = app
        .get(&format!("/environments/{ENV}/apis?perPage=101"), &app.alice)
        .await;
    assert_eq!(too_large.status, StatusCode::BAD_REQUEST);
    assert_eq!(too_large.body["technicalCode"], "validation.error");
}

#[tokio::test]
async fn test_malformed_query_string_is_a_json_validation_error() {
    let app = TestApp::new().await;

    let response = app
        .get(&format!("/environments/{ENV}/apis?page=abc"), &app.alice)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers[header::CONTENT_TYPE].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(response.body["httpStatus"], 400);
    assert_eq!(response.body["message"], "Validation error");
    assert_eq!(response.body["technicalCode"], "validation.error");
    let detail = response.body["details"][0]["message"].as_str().unwrap();
    assert!(detail.starts_with("Failed to deserialize query string"), "{detail}");
}

#[tokio::test]
async fn test_malformed_path_is_a_json_validation_error() {
    let app = TestApp::new().await;

    let response = app
        .get(&format!("/environments/{ENV}/apis/not-a-uuid"), &app.alice)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Validation error");
    assert!(response.body["details"][0]["message"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_a_json_validation_error() {
    let app = TestApp::new().await;

    let missing_field = app
        .post(
            &format!("/environments/{ENV}/apis"),
            &app.alice,
            json!({ "apiVersion": "1.0" }),
        )
        .await;
    assert_eq!(missing_field.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_field.body["technicalCode"], "validation.error");
    let detail = missing_field.body["details"][0]["message"].as_str().unwrap();
    assert!(detail.contains("missing field `name`"), "{detail}");

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/environments/{ENV}/apis"))
        .header("x-user-id", app.alice.id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Validation error");
}

#[tokio::test]
async fn test_list_apis_filters_by_name() {
    let app = TestApp::new().await;
    app.create_api(&app.alice, "Payments").await;
    app.create_api(&app.alice, "Orders").await;

    let response = app
        .get(&format!("/environments/{ENV}/apis?q=PAY"), &app.alice)
        .await;

    assert_eq!(response.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["data"][0]["name"], "Payments");
}

#[tokio::test]
async fn test_get_api_checks_permission_before_existence() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let forbidden = app
        .get(&format!("/environments/{ENV}/apis/{api_id}"), &app.mallory)
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(
        forbidden.body["message"],
        "You do not have sufficient rights to access this resource"
    );

    let unknown = Uuid::new_v4();
    let hidden = app
        .get(&format!("/environments/{ENV}/apis/{unknown}"), &app.mallory)
        .await;
    assert_eq!(hidden.status, StatusCode::FORBIDDEN);

    let missing = app
        .get(&format!("/environments/{ENV}/apis/{unknown}"), &app.admin)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], format!("Api [{unknown}] cannot be found."));
}

#[tokio::test]
async fn test_update_api_keeps_absent_fields() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let response = app
        .put(
            &format!("/environments/{ENV}/apis/{api_id}"),
            &app.alice,
            json!({ "visibility": "PUBLIC", "lifecycleState": "PUBLISHED" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Orders");
    assert_eq!(response.body["apiVersion"], "1.0");
    assert_eq!(response.body["visibility"], "PUBLIC");
    assert_eq!(response.body["lifecycleState"], "PUBLISHED");
}

#[tokio::test]
async fn test_start_stop_and_delete_lifecycle() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    let base = format!("/environments/{ENV}/apis/{api_id}");

    let started = app.post_empty(&format!("{base}/_start"), &app.alice).await;
    assert_eq!(started.status, StatusCode::OK);
    assert_eq!(started.body["state"], "STARTED");

    let again = app.post_empty(&format!("{base}/_start"), &app.alice).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["message"], format!("Api [{api_id}] is already started"));

    let running = app.delete(&base, &app.alice).await;
    assert_eq!(running.status, StatusCode::BAD_REQUEST);
    assert_eq!(running.body["message"], format!("Api [{api_id}] is still running"));

    let stopped = app.post_empty(&format!("{base}/_stop"), &app.alice).await;
    assert_eq!(stopped.body["state"], "STOPPED");

    let deleted = app.delete(&base, &app.alice).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.get(&base, &app.admin).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_plain_member_cannot_delete_api() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    app.post(
        &format!("/environments/{ENV}/apis/{api_id}/members"),
        &app.alice,
        json!({ "userId": app.bob.id, "roleName": "USER" }),
    )
    .await;

    let response = app
        .delete(&format!("/environments/{ENV}/apis/{api_id}"), &app.bob)
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
