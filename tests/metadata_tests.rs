mod common;

use axum::http::{StatusCode, header};
use common::{ENV, TestApp};
use serde_json::json;
use uuid::Uuid;

fn metadata_uri(api_id: Uuid) -> String {
    format!("/environments/{ENV}/apis/{api_id}/metadata")
}

#[tokio::test]
async fn test_create_metadata_derives_key_from_name() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let response = app
        .post(
            &metadata_uri(api_id),
            &app.alice,
            json!({ "name": "Support Email", "value": "help@example.com", "format": "MAIL" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["key"], "support-email");
    assert_eq!(response.body["format"], "MAIL");
    assert_eq!(
        response.headers[header::LOCATION].to_str().unwrap(),
        format!("{}/support-email", metadata_uri(api_id))
    );

    let fetched = app
        .get(&format!("{}/support-email", metadata_uri(api_id)), &app.alice)
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["value"], "help@example.com");
}

#[tokio::test]
async fn test_create_metadata_defaults_to_string_and_rejects_duplicates() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let created = app
        .post(&metadata_uri(api_id), &app.alice, json!({ "name": "Team", "value": "core" }))
        .await;
    assert_eq!(created.body["format"], "STRING");

    let duplicate = app
        .post(&metadata_uri(api_id), &app.alice, json!({ "name": "team", "value": "other" }))
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["technicalCode"], "metadata.duplicated");
}

#[tokio::test]
async fn test_metadata_values_are_validated_against_format() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let invalid = app
        .post(
            &metadata_uri(api_id),
            &app.alice,
            json!({ "name": "Launch", "value": "31/12/2030", "format": "DATE" }),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        invalid.body["details"][0]["message"],
        "Invalid DATE value: 31/12/2030"
    );

    let template = app
        .post(
            &metadata_uri(api_id),
            &app.alice,
            json!({ "name": "Launch", "value": "${api.launch}", "format": "DATE" }),
        )
        .await;
    assert_eq!(template.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_update_metadata_revalidates_value() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    app.post(
        &metadata_uri(api_id),
        &app.alice,
        json!({ "name": "Retries", "value": "3", "format": "NUMERIC" }),
    )
    .await;
    let uri = format!("{}/retries", metadata_uri(api_id));

    let invalid = app.put(&uri, &app.alice, json!({ "value": "three" })).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let updated = app
        .put(&uri, &app.alice, json!({ "value": "5", "name": "Max retries" }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["key"], "retries");
    assert_eq!(updated.body["name"], "Max retries");
    assert_eq!(updated.body["value"], "5");
}

#[tokio::test]
async fn test_list_metadata_sorted_by_name() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    for name in ["Zone", "Audience", "Owner"] {
        app.post(&metadata_uri(api_id), &app.alice, json!({ "name": name, "value": "x" }))
            .await;
    }

    let response = app
        .get(&format!("{}?perPage=2", metadata_uri(api_id)), &app.alice)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Audience", "Owner"]);
    assert_eq!(response.body["pagination"]["pageCount"], 2);
    assert!(response.body["links"].get("previous").is_none());
    assert_eq!(
        response.body["links"]["next"],
        format!("{}?perPage=2&page=2", metadata_uri(api_id))
    );
}

#[tokio::test]
async fn test_unknown_metadata_key_is_not_found() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    let uri = format!("{}/missing", metadata_uri(api_id));

    let fetched = app.get(&uri, &app.alice).await;
    assert_eq!(fetched.status, StatusCode::NOT_FOUND);
    assert_eq!(fetched.body["message"], "Metadata [missing] cannot be found.");

    let deleted = app.delete(&uri, &app.alice).await;
    assert_eq!(deleted.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_metadata() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    app.post(&metadata_uri(api_id), &app.alice, json!({ "name": "Team", "value": "core" }))
        .await;
    let uri = format!("{}/team", metadata_uri(api_id));

    let deleted = app.delete(&uri, &app.alice).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let fetched = app.get(&uri, &app.alice).await;
    assert_eq!(fetched.status, StatusCode::NOT_FOUND);
}
