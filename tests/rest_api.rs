//! REST API Tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use digitooldb::rest_api::router;
use digitooldb::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Utilities
// =============================================================================

fn app() -> Router {
    router(Arc::new(Engine::in_memory()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn app_with_collection() -> Router {
    let app = app();
    assert_eq!(send(&app, "POST", "/t", None).await.0, StatusCode::CREATED);
    assert_eq!(send(&app, "POST", "/t/u", None).await.0, StatusCode::CREATED);
    app
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_database_and_collection_routes() {
    let app = app_with_collection().await;

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["t"]));

    let (_, body) = send(&app, "GET", "/t", None).await;
    assert_eq!(body, json!(["u"]));

    let (status, _) = send(&app, "DELETE", "/t/u/_collection", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/t", None).await;
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, "DELETE", "/t", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", "/t", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_document_routes() {
    let app = app_with_collection().await;

    let (status, body) = send(&app, "POST", "/t/u", Some(json!({"name": "John", "age": 30}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/t/u?filter=%7B%22age%22%3A%7B%22%24lt%22%3A35%7D%7D", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["_id"], json!(id));

    let (status, body) = send(
        &app,
        "PUT",
        "/t/u",
        Some(json!({"query": {"name": "John"}, "update": {"$inc": {"age": 1}}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"matched": 1, "modified": 1, "failed": 0}));

    let (status, body) = send(&app, "DELETE", "/t/u", Some(json!({"query": {}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted_count": 1}));

    let (_, body) = send(&app, "GET", "/t/u", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_index_routes() {
    let app = app_with_collection().await;

    let (status, _) = send(&app, "POST", "/t/u/_indices", Some(json!({"field": "name"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/t/u/_indices", Some(json!({"field": "name"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let (_, body) = send(&app, "GET", "/t/u/_indices", None).await;
    assert_eq!(body, json!(["name"]));

    let (status, body) = send(&app, "POST", "/t/u/_verify", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"field": "name", "consistent": true, "rebuilt": false}]));

    let (status, _) = send(&app, "DELETE", "/t/u/_indices/name", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", "/t/u/_indices/name", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app_with_collection().await;

    let (status, body) = send(&app, "POST", "/bad-name", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_NAME");

    let (status, body) = send(&app, "PUT", "/t/u", Some(json!({"query": {}, "update": {"age": 1}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_UPDATE");

    let (status, body) = send(&app, "GET", "/t/u?filter=%7B%22a%22%3A%7B%22%24where%22%3A1%7D%7D", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_QUERY");

    let (status, _) = send(&app, "POST", "/t/missing", Some(json!({"a": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// An update body without `query` is rejected instead of touching every document
#[tokio::test]
async fn test_update_requires_query() {
    let app = app_with_collection().await;
    send(&app, "POST", "/t/u", Some(json!([{"n": 1}, {"n": 2}]))).await;

    let (status, body) = send(&app, "PUT", "/t/u", Some(json!({"update": {"$set": {"n": 0}}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, body) = send(&app, "GET", "/t/u?filter=%7B%22n%22%3A0%7D", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}
