//! Serverless envelope and runtime API loop

mod common;

use churn_predictor::serverless::{handle_event, RuntimeClient, ServerlessEvent};
use common::*;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_string_body_prediction() {
    let store = store_with_model("v1").await;
    let service = service(&store);

    let event = ServerlessEvent {
        body: Some(Value::String(features_json().to_string())),
        ..Default::default()
    };
    let response = handle_event(&service, event).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers["Content-Type"], "application/json");
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body, json!({"prediction": 0, "probability": [[1.0, 0.0]]}));
}

#[tokio::test]
async fn test_object_body_prediction() {
    let store = store_with_model("v1").await;
    let service = service(&store);

    let event: ServerlessEvent =
        serde_json::from_value(json!({ "body": features_json() })).unwrap();
    let response = handle_event(&service, event).await;

    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_missing_body_is_bad_request() {
    let store = store_with_model("v1").await;
    let response = handle_event(&service(&store), ServerlessEvent::default()).await;

    assert_eq!(response.status_code, 400);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(store.fetch_count(), 0);
}

#[tokio::test]
async fn test_missing_model_is_service_unavailable() {
    let store = churn_predictor::storage::InMemoryArtifactStore::new();
    let event = ServerlessEvent {
        body: Some(features_json()),
        ..Default::default()
    };
    let response = handle_event(&service(&store), event).await;

    assert_eq!(response.status_code, 503);
}

#[tokio::test]
async fn test_warm_invocations_reuse_model() {
    let store = store_with_model("v1").await;
    let service = service(&store);

    for _ in 0..5 {
        let event = ServerlessEvent {
            body: Some(features_json()),
            ..Default::default()
        };
        assert_eq!(handle_event(&service, event).await.status_code, 200);
    }
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn test_runtime_client_round_trip() {
    let store = store_with_model("v1").await;
    let service = service(&store);

    let mut server = mockito::Server::new_async().await;
    let next = server
        .mock("GET", "/2018-06-01/runtime/invocation/next")
        .with_status(200)
        .with_header("Lambda-Runtime-Aws-Request-Id", "req-1")
        .with_header("content-type", "application/json")
        .with_body(json!({ "body": features_json().to_string() }).to_string())
        .create_async()
        .await;
    let reply = server
        .mock("POST", "/2018-06-01/runtime/invocation/req-1/response")
        .match_body(mockito::Matcher::PartialJson(json!({ "statusCode": 200 })))
        .with_status(202)
        .create_async()
        .await;

    let runtime = RuntimeClient::new(&server.url());
    runtime.process_next(&service).await.unwrap();

    next.assert_async().await;
    reply.assert_async().await;
}

#[tokio::test]
async fn test_runtime_client_reports_invalid_event() {
    let store = store_with_model("v1").await;
    let service = service(&store);

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/2018-06-01/runtime/invocation/next")
        .with_status(200)
        .with_header("Lambda-Runtime-Aws-Request-Id", "req-2")
        .with_body("\"not an event\"")
        .create_async()
        .await;
    let error = server
        .mock("POST", "/2018-06-01/runtime/invocation/req-2/error")
        .with_status(202)
        .create_async()
        .await;

    RuntimeClient::new(&server.url())
        .process_next(&service)
        .await
        .unwrap();

    error.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_runtime_backs_off() {
    let store = store_with_model("v1").await;
    let service = service(&store);

    // Nothing listens on port 1, so the poll fails at connect time.
    let runtime = RuntimeClient::new("127.0.0.1:1").with_error_backoff(Duration::from_millis(200));

    let started = Instant::now();
    assert!(runtime.poll(&service).await.is_err());
    assert!(started.elapsed() >= Duration::from_millis(200));
}
