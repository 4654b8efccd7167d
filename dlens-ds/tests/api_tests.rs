//! Integration tests for dlens-ds API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use helpers::{seed_project, seed_stored_image, StubImageSource, TestContext, PNG_BYTES};

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = TestContext::new(StubImageSource::new()).await;
    let (status, body) = send(ctx.app(), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "dlens-ds");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_export_endpoint_success() {
    let ctx = TestContext::new(StubImageSource::new().with_stored(7, b"bytes")).await;
    seed_project(&ctx.pool, "Line 1").await;

    let payload = json!({
        "projectId": 1,
        "images": [{
            "id": "7",
            "filename": "a.jpg",
            "width": 100,
            "height": 100,
            "annotations": [{"x": 0, "y": 0, "w": 50, "h": 50, "label": "defect"}]
        }]
    });
    let (status, body) = send(ctx.app(), "POST", "/api/datasets/export", Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["storagePrefix"], "projects/1/dataset/");
    assert_eq!(body["dataset"]["projectId"], 1);
    assert_eq!(body["dataset"]["status"], "ready");
    assert!(body["dataset"]["name"]
        .as_str()
        .unwrap()
        .starts_with("yolo-export-"));
}

#[tokio::test]
async fn test_export_endpoint_error_statuses() {
    let ctx = TestContext::new(StubImageSource::new().failing(5)).await;
    seed_project(&ctx.pool, "Line 1").await;

    let cases = [
        (json!({"images": []}), StatusCode::BAD_REQUEST),
        (
            json!({"projectId": 1, "images": [{"id": 5, "filename": "a.jpg", "width": 0, "height": 10}]}),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({"projectId": 42, "images": [{"id": 5, "filename": "a.jpg", "width": 10, "height": 10}]}),
            StatusCode::NOT_FOUND,
        ),
        (
            json!({"projectId": 1, "images": [{"id": 5, "filename": "a.jpg", "width": 10, "height": 10}]}),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (payload, expected) in cases {
        let (status, body) = send(ctx.app(), "POST", "/api/datasets/export", Some(payload)).await;
        assert_eq!(status, expected);
        assert!(body["error"].is_string(), "missing error message: {}", body);
    }

    assert!(ctx.store.keys("").await.is_empty());
}

#[tokio::test]
async fn test_export_endpoint_rejects_malformed_json() {
    let ctx = TestContext::new(StubImageSource::new()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/datasets/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = ctx.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_image_proxy() {
    let ctx = TestContext::new(StubImageSource::new()).await;
    let project = seed_project(&ctx.pool, "Line 1").await;
    let image = seed_stored_image(&ctx.pool, ctx.store.as_ref(), project.id, "a.png", PNG_BYTES).await;

    let response = ctx
        .app()
        .oneshot(
            Request::builder()
                .uri(format!("/api/images/{}/proxy", image.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG_BYTES);

    let (status, body) = send(ctx.app(), "GET", "/api/images/abc/proxy", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid image id");

    let (status, _) = send(ctx.app(), "GET", "/api/images/999/proxy", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_annotation_round_trip() {
    let ctx = TestContext::new(StubImageSource::new()).await;

    let (status, body) = send(ctx.app(), "GET", "/api/annotations/12", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"boxes": [], "width": null, "height": null}));

    let entry = json!({
        "boxes": [{"x": 10.5, "y": 20.0, "w": 30.0, "h": 40.0, "label": "defect"}],
        "width": 640,
        "height": 480
    });
    let (status, body) = send(ctx.app(), "PUT", "/api/annotations/12", Some(entry.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageKey"], "12");
    assert_eq!(body["boxCount"], 1);
    assert_eq!(body["naturalSize"], json!({"width": 640, "height": 480}));

    let (_, body) = send(ctx.app(), "GET", "/api/annotations/12", None).await;
    assert_eq!(body, entry);

    let (_, body) = send(ctx.app(), "GET", "/api/labeled", None).await;
    assert_eq!(body, json!({"images": ["12"]}));
}

#[tokio::test]
async fn test_annotation_save_requires_dimensions_with_boxes() {
    let ctx = TestContext::new(StubImageSource::new()).await;

    let entry = json!({"boxes": [{"x": 1, "y": 1, "w": 2, "h": 2}]});
    let (status, body) = send(ctx.app(), "PUT", "/api/annotations/5", Some(entry)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, body) = send(ctx.app(), "GET", "/api/labeled", None).await;
    assert_eq!(body, json!({"images": []}));

    // Zero boxes without dimensions still counts as reviewed
    let (status, _) = send(ctx.app(), "PUT", "/api/annotations/5", Some(json!({"boxes": []}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(ctx.app(), "GET", "/api/labeled", None).await;
    assert_eq!(body, json!({"images": ["5"]}));
}

#[tokio::test]
async fn test_project_listings_and_next_unlabeled() {
    let ctx = TestContext::new(StubImageSource::new()).await;
    let project = seed_project(&ctx.pool, "Line 1").await;
    let first = seed_stored_image(&ctx.pool, ctx.store.as_ref(), project.id, "a.png", PNG_BYTES).await;
    let second = seed_stored_image(&ctx.pool, ctx.store.as_ref(), project.id, "b.png", PNG_BYTES).await;

    let (status, body) = send(ctx.app(), "GET", "/api/projects/1/images", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    // Newest first
    assert_eq!(ids, vec![second.id, first.id]);

    let uri = "/api/projects/1/next-unlabeled";
    let (_, body) = send(ctx.app(), "GET", uri, None).await;
    assert_eq!(body["imageId"], second.id.to_string());

    let key = format!("/api/annotations/{}", second.id);
    send(ctx.app(), "PUT", &key, Some(json!({"boxes": []}))).await;
    let (_, body) = send(ctx.app(), "GET", uri, None).await;
    assert_eq!(body["imageId"], first.id.to_string());

    let (status, body) = send(ctx.app(), "GET", "/api/projects/1/datasets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = send(ctx.app(), "GET", "/api/projects/77/images", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(ctx.app(), "GET", "/api/projects/x/datasets", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
