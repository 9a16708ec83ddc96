//! Root, status, fallback and CORS behaviour of the router

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use commongood::core::config::Environment;
use common::TestApp;
use tower::ServiceExt;

#[tokio::test]
async fn test_root_welcome() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Welcome to the CommonGood API!");
    assert_eq!(body["data"]["version"], commongood::VERSION);
}

#[tokio::test]
async fn test_status_reports_counts() {
    let app = TestApp::new().await;
    let ada = app.signup("Ada", "ada@example.com").await;
    app.create_listing(&ada, "Guitar lessons").await;

    let (status, body) = app.get("/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["status"], "running");
    assert_eq!(body["data"]["environment"], "development");
    assert_eq!(body["data"]["counts"]["users"], 1);
    assert_eq!(body["data"]["counts"]["listings"], 1);
    assert_eq!(body["data"]["counts"]["reviews"], 0);
    assert!(body["data"]["uptimeSeconds"].is_u64());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/v1/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find /api/v1/nope on this server!");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
}

async fn preflight(app: &TestApp, origin: &str) -> Option<String> {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/listings")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn test_cors_allows_only_configured_origins() {
    let app = TestApp::with_config(|config| {
        config.server.allowed_origins = vec!["https://commongood.example".to_string()];
    })
    .await;
    assert_eq!(
        preflight(&app, "https://commongood.example").await.as_deref(),
        Some("https://commongood.example")
    );
    assert_eq!(preflight(&app, "https://evil.example").await, None);

    let open = TestApp::new().await;
    assert_eq!(preflight(&open, "https://anywhere.example").await.as_deref(), Some("*"));
}

#[tokio::test]
async fn test_production_environment_is_reported() {
    let app = TestApp::with_config(|config| config.environment = Environment::Production).await;
    let (_, body) = app.get("/api/v1/status", None).await;
    assert_eq!(body["data"]["environment"], "production");
}
