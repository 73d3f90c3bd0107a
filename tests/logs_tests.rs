mod common;

use std::collections::BTreeMap;

use apim_console::models::{
    ConnectionLog, ConnectionLogDetail, ConnectorType, LogRequest, LogResponse, MessageLog,
    MessageOperation,
};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ENV, TestApp};
use uuid::Uuid;

const BASE_MILLIS: i64 = 1_700_000_000_000;

fn at(offset_seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(BASE_MILLIS + offset_seconds * 1000).unwrap()
}

fn logs_uri(api_id: Uuid) -> String {
    format!("/environments/{ENV}/apis/{api_id}/logs")
}

fn connection_log(api_id: Uuid, request_id: &str, offset_seconds: i64) -> ConnectionLog {
    ConnectionLog {
        request_id: request_id.to_string(),
        api_id,
        timestamp: at(offset_seconds),
        application_id: None,
        plan_id: None,
        client_identifier: Some("client-1".to_string()),
        transaction_id: Some(format!("tx-{request_id}")),
        method: "GET".to_string(),
        status: 200,
        uri: "/orders".to_string(),
        request_ended: true,
        gateway_response_time_ms: 12,
    }
}

fn message_log(api_id: Uuid, request_id: &str, offset_seconds: i64) -> MessageLog {
    MessageLog {
        id: Uuid::new_v4(),
        api_id,
        request_id: request_id.to_string(),
        timestamp: at(offset_seconds),
        operation: MessageOperation::Subscribe,
        connector_type: ConnectorType::Entrypoint,
        connector_id: "sse".to_string(),
        message_id: Some(format!("message-{offset_seconds}")),
        payload: Some("{}".to_string()),
        headers: BTreeMap::new(),
        metadata: BTreeMap::new(),
    }
}

fn data_ids(body: &serde_json::Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["requestId"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_list_logs_newest_first_with_embedded_plan_and_application() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    let plan_id = app.published_plan(&app.alice, api_id, "AUTO").await;

    let mut matched = connection_log(api_id, "req-1", 0);
    matched.plan_id = Some(plan_id);
    matched.application_id = Some(app.application.id);
    app.repo.add_connection_log(matched).await;
    app.repo
        .add_connection_log(connection_log(api_id, "req-2", 10))
        .await;

    let response = app.get(&logs_uri(api_id), &app.alice).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(data_ids(&response.body), vec!["req-2", "req-1"]);
    let older = &response.body["data"][1];
    assert_eq!(older["plan"]["name"], "AUTO plan");
    assert_eq!(older["application"]["name"], "Mobile app");
    assert_eq!(older["transactionId"], "tx-req-1");
    assert!(response.body["data"][0].get("plan").is_none());
    assert_eq!(response.body["pagination"]["totalCount"], 2);
}

#[tokio::test]
async fn test_list_logs_falls_back_to_unknown_references() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    let plan_id = Uuid::new_v4();
    let application_id = Uuid::new_v4();

    let mut log = connection_log(api_id, "req-1", 0);
    log.plan_id = Some(plan_id);
    log.application_id = Some(application_id);
    app.repo.add_connection_log(log).await;

    let response = app.get(&logs_uri(api_id), &app.alice).await;

    let entry = &response.body["data"][0];
    assert_eq!(entry["plan"]["id"], plan_id.to_string());
    assert_eq!(entry["plan"]["name"], "Unknown plan");
    assert_eq!(entry["application"]["id"], application_id.to_string());
    assert_eq!(entry["application"]["name"], "Unknown application");
}

#[tokio::test]
async fn test_list_logs_applies_filters() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let mut post = connection_log(api_id, "post", 20);
    post.method = "POST".to_string();
    post.status = 500;
    app.repo.add_connection_log(post).await;
    app.repo
        .add_connection_log(connection_log(api_id, "early", 0))
        .await;
    app.repo
        .add_connection_log(connection_log(api_id, "late", 40))
        .await;
    app.repo
        .add_connection_log(connection_log(Uuid::new_v4(), "other-api", 20))
        .await;

    let by_method = app
        .get(&format!("{}?methods=post", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(data_ids(&by_method.body), vec!["post"]);

    let by_status = app
        .get(&format!("{}?statuses=200", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(data_ids(&by_status.body), vec!["late", "early"]);

    let window = app
        .get(
            &format!(
                "{}?from={}&to={}",
                logs_uri(api_id),
                BASE_MILLIS + 10_000,
                BASE_MILLIS + 30_000
            ),
            &app.alice,
        )
        .await;
    assert_eq!(data_ids(&window.body), vec!["post"]);
}

#[tokio::test]
async fn test_list_logs_rejects_invalid_time_range() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let negative = app
        .get(&format!("{}?from=-1", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
    assert_eq!(negative.body["message"], "Validation error");
    assert_eq!(
        negative.body["details"][0]["message"],
        "from must be a positive timestamp"
    );

    let reversed = app
        .get(&format!("{}?from=2000&to=1000", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(reversed.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reversed.body["details"][0]["message"],
        "'to' must be after 'from'"
    );
}

#[tokio::test]
async fn test_list_logs_rejects_non_numeric_timestamp() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;

    let response = app
        .get(&format!("{}?from=yesterday", logs_uri(api_id)), &app.alice)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Validation error");
    assert_eq!(response.body["technicalCode"], "validation.error");
}

#[tokio::test]
async fn test_list_logs_clamps_page_past_the_end() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    for (index, offset) in [0, 10, 20, 30, 40].into_iter().enumerate() {
        app.repo
            .add_connection_log(connection_log(api_id, &format!("req-{index}"), offset))
            .await;
    }

    let uri = format!("{}?page=99&perPage=2", logs_uri(api_id));
    let response = app.get(&uri, &app.alice).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(data_ids(&response.body), vec!["req-0"]);
    assert_eq!(
        response.body["pagination"],
        serde_json::json!({
            "page": 3,
            "perPage": 2,
            "pageCount": 3,
            "pageItemsCount": 1,
            "totalCount": 5
        })
    );

    let links = &response.body["links"];
    assert_eq!(links["self"], uri);
    assert_eq!(links["first"], format!("{}?page=1&perPage=2", logs_uri(api_id)));
    assert_eq!(links["previous"], format!("{}?page=2&perPage=2", logs_uri(api_id)));
    assert!(links.get("next").is_none());
    assert!(links.get("last").is_none());
}

#[tokio::test]
async fn test_logs_require_log_permission() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    app.post(
        &format!("/environments/{ENV}/apis/{api_id}/members"),
        &app.alice,
        serde_json::json!({ "userId": app.bob.id, "roleName": "USER" }),
    )
    .await;

    let response = app.get(&logs_uri(api_id), &app.bob).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_log_detail() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    app.repo
        .add_connection_log_detail(ConnectionLogDetail {
            request_id: "req-1".to_string(),
            api_id,
            timestamp: at(0),
            client_identifier: None,
            request_ended: true,
            entrypoint_request: LogRequest {
                method: "GET".to_string(),
                uri: "/orders".to_string(),
                headers: BTreeMap::from([("accept".to_string(), vec!["*/*".to_string()])]),
                body: None,
            },
            entrypoint_response: LogResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: Some("[]".to_string()),
            },
            endpoint_request: LogRequest {
                method: "GET".to_string(),
                uri: "https://backend.internal/orders".to_string(),
                ..Default::default()
            },
            endpoint_response: LogResponse {
                status: 200,
                ..Default::default()
            },
        })
        .await;

    let found = app
        .get(&format!("{}/req-1", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["requestId"], "req-1");
    assert_eq!(found.body["entrypoint"]["request"]["headers"]["accept"][0], "*/*");
    assert_eq!(found.body["entrypoint"]["response"]["body"], "[]");
    assert_eq!(
        found.body["endpoint"]["request"]["uri"],
        "https://backend.internal/orders"
    );

    let missing = app
        .get(&format!("{}/req-9", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(
        missing.body["message"],
        format!("No log found for api: {api_id} and requestId: req-9")
    );
}

#[tokio::test]
async fn test_list_messages_is_paginated_oldest_first() {
    let app = TestApp::new().await;
    let api_id = app.create_api(&app.alice, "Orders").await;
    for offset in [30, 10, 20] {
        app.repo
            .add_message_log(message_log(api_id, "req-1", offset))
            .await;
    }
    app.repo
        .add_message_log(message_log(api_id, "req-2", 0))
        .await;

    let uri = format!("{}/req-1/messages?perPage=2", logs_uri(api_id));
    let first = app.get(&uri, &app.alice).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"][0]["messageId"], "message-10");
    assert_eq!(first.body["data"][1]["messageId"], "message-20");
    assert_eq!(first.body["data"][0]["operation"], "SUBSCRIBE");
    assert_eq!(first.body["data"][0]["connectorType"], "ENTRYPOINT");
    assert_eq!(first.body["pagination"]["totalCount"], 3);
    assert_eq!(first.body["pagination"]["pageCount"], 2);
    assert_eq!(
        first.body["links"]["next"],
        format!("{}/req-1/messages?perPage=2&page=2", logs_uri(api_id))
    );

    let empty = app
        .get(&format!("{}/unknown/messages", logs_uri(api_id)), &app.alice)
        .await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["data"], serde_json::json!([]));
}
