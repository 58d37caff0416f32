mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{MemoryStore, SVG, config, png, service};
use http_body_util::BodyExt;
use image::GenericImageView;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn send(store: Arc<MemoryStore>, request: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let app = thumbd::app(service(store, &config()));
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn scale_endpoint_returns_gateway_envelope() {
    let store = Arc::new(MemoryStore::default().with_object("media/abc", png(100, 200), "image/png"));
    let (status, headers, body) = send(store, get("/scale?key=abc/50")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 200);
    assert_eq!(envelope["headers"]["Content-Type"], "image/jpeg");
    assert_eq!(envelope["isBase64Encoded"], true);
    assert!(envelope["body"].as_str().unwrap().starts_with("/9j/"));
}

#[tokio::test]
async fn scale_endpoint_without_key_reports_422_in_envelope() {
    let (status, _, body) = send(Arc::new(MemoryStore::default()), get("/scale")).await;
    assert_eq!(status, StatusCode::OK);
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 422);
}

#[tokio::test]
async fn invoke_accepts_gateway_event() {
    let store = Arc::new(MemoryStore::default().with_object("media/logo", SVG, "image/svg+xml"));
    let event = json!({ "queryStringParameters": { "key": "media/logo/300" } });
    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(event.to_string()))
        .unwrap();

    let (_, _, body) = send(store, request).await;
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 200);
    assert_eq!(envelope["headers"]["Content-Type"], "image/svg+xml");
    assert_eq!(envelope["body"], SVG);
    assert!(envelope.get("isBase64Encoded").is_none());
}

#[tokio::test]
async fn object_parameter_is_accepted_as_the_key() {
    let store = Arc::new(MemoryStore::default().with_object("media/abc", png(100, 200), "image/png"));
    let (_, _, body) = send(store, get("/scale?object=media/abc/50")).await;
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 200);
    assert_eq!(envelope["headers"]["Content-Type"], "image/jpeg");

    let store = Arc::new(MemoryStore::default().with_object("media/logo", SVG, "image/svg+xml"));
    let event = json!({ "queryStringParameters": { "object": "media/logo/300" } });
    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .body(Body::from(event.to_string()))
        .unwrap();
    let (_, _, body) = send(store, request).await;
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 200);
    assert_eq!(envelope["body"], SVG);
}

#[tokio::test]
async fn invoke_with_bad_json_is_500_envelope() {
    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .body(Body::from("{not json"))
        .unwrap();
    let (_, _, body) = send(Arc::new(MemoryStore::default()), request).await;
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 500);
}

#[tokio::test]
async fn invoke_with_null_query_is_422() {
    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .body(Body::from(r#"{"queryStringParameters":null}"#))
        .unwrap();
    let (_, _, body) = send(Arc::new(MemoryStore::default()), request).await;
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["statusCode"], 422);
}

#[tokio::test]
async fn media_endpoint_serves_jpeg_bytes_directly() {
    let store = Arc::new(MemoryStore::default().with_object("media/abc", png(100, 200), "image/png"));
    let (status, headers, body) = send(store, get("/media/abc/50")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[header::CACHE_CONTROL], "max-age=64800");
    let img = image::load_from_memory(&body).unwrap();
    assert_eq!(img.dimensions(), (25, 50));
}

#[tokio::test]
async fn media_endpoint_maps_errors_to_http_status() {
    let (status, _, body) = send(Arc::new(MemoryStore::default()), get("/media/abc/10")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("20 to 2560"));

    let (status, _, _) = send(Arc::new(MemoryStore::default()), get("/media/ghost/50")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_readiness() {
    let (status, _, body) = send(Arc::new(MemoryStore::default()), get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["status"], "ok");

    let (status, _, _) = send(Arc::new(MemoryStore::default()), get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);

    let failing = Arc::new(MemoryStore {
        fail_get: true,
        ..MemoryStore::default()
    });
    let (status, _, body) = send(failing, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let ready: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(ready["checks"]["store"]["ok"], false);
}
