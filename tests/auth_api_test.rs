//! Signup, login and bearer-token checks on protected routes

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_signup_returns_token_and_user() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/v1/auth/signup",
            None,
            json!({"name": "  Ada Lovelace ", "email": "ADA@Example.com", "password": "password123"}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert!(body["token"].as_str().unwrap().len() > 20);
    let user = &body["data"]["user"];
    assert_eq!(user["name"], "Ada Lovelace");
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["averageRating"], 0.0);
    assert_eq!(user["numReviews"], 0);
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn test_signup_rejections() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/api/v1/auth/signup", None, json!({"name": "Ada", "email": "a@b.co"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Please provide name, email, and password!");

    let (status, body) = app
        .post(
            "/api/v1/auth/signup",
            None,
            json!({"name": "Ada", "email": "not-an-email", "password": "short"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    let fields: Vec<_> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);

    app.signup("Ada", "ada@example.com").await;
    let (status, body) = app
        .post(
            "/api/v1/auth/signup",
            None,
            json!({"name": "Other", "email": "ada@example.com", "password": "password123"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Duplicate field value: ada@example.com. Please use another value!"
    );
}

#[tokio::test]
async fn test_login() {
    let app = TestApp::new().await;
    app.signup("Ada", "ada@example.com").await;

    let (status, body) = app
        .post("/api/v1/auth/login", None, json!({"email": "ada@example.com"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide email and password!");

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "ada@example.com", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect email or password.");

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "Ada@Example.com ", "password": "password123"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, body) = app.get("/api/v1/auth/me", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_login_accepts_urlencoded_forms() {
    let app = TestApp::new().await;
    app.signup("Ada", "ada@example.com").await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(axum::body::Body::from("email=ada%40example.com&password=password123"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_protected_route_token_checks() {
    let app = TestApp::new().await;
    let user = app.signup("Ada", "ada@example.com").await;
    let jwt = app.jwt();

    let (status, body) = app.get("/api/v1/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "You are not logged in! Please log in to get access.");

    let (status, body) = app.get("/api/v1/auth/me", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token. Please log in again.");

    let expired = jwt
        .generate_token_at(&user.id, Utc::now() - Duration::days(365))
        .unwrap();
    let (status, body) = app.get("/api/v1/auth/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Your token has expired! Please log in again.");

    let ghost = jwt.generate_token(Uuid::new_v4()).unwrap();
    let (status, body) = app.get("/api/v1/auth/me", Some(&ghost)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "The user belonging to this token does no longer exist."
    );
}

#[tokio::test]
async fn test_password_change_invalidates_older_tokens() {
    let app = TestApp::new().await;
    let user = app.signup("Ada", "ada@example.com").await;
    let old_token = app
        .jwt()
        .generate_token_at(&user.id, Utc::now() - Duration::hours(1))
        .unwrap();

    let (status, body) = app
        .patch(
            "/api/v1/users/updateMyPassword",
            Some(&user.token),
            json!({"passwordCurrent": "nope-nope", "password": "newpassword1", "passwordConfirm": "newpassword1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Your current password is wrong.");

    let (status, body) = app
        .patch(
            "/api/v1/users/updateMyPassword",
            Some(&user.token),
            json!({"passwordCurrent": "password123", "password": "newpassword1", "passwordConfirm": "newpassword1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let fresh = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/v1/auth/me", Some(&old_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User recently changed password! Please log in again.");

    let (status, _) = app.get("/api/v1/auth/me", Some(&fresh)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "ada@example.com", "password": "newpassword1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
