//! Shared harness for the API integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use commongood::core::config::AuthConfig;
use commongood::http::auth::JwtService;
use commongood::storage::media::LocalMediaStorage;
use commongood::{build_router, AppConfig, CommonGoodService, Store};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "commongood-test-boundary";

/// A 1x1 PNG
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89,
];

pub struct TestApp {
    pub router: Router,
    pub service: Arc<CommonGoodService>,
    pub media_dir: PathBuf,
    _temp: TempDir,
}

/// A signed-up user
pub struct TestUser {
    pub id: String,
    pub token: String,
}

/// One part of a multipart body
pub enum PartSpec<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let temp = TempDir::new().unwrap();
        let media_dir = temp.path().join("uploads");

        let mut config = AppConfig::default();
        config.database.path = ":memory:".into();
        config.media.local_dir = media_dir.clone();
        adjust(&mut config);

        let store = Store::open_in_memory().await.unwrap();
        let media = LocalMediaStorage::new(media_dir.clone(), config.media.public_base_url.clone())
            .unwrap();
        let service = Arc::new(CommonGoodService::with_parts(config, store, Arc::new(media)));

        Self {
            router: build_router(service.clone()),
            service,
            media_dir,
            _temp: temp,
        }
    }

    pub fn jwt(&self) -> JwtService {
        let auth: &AuthConfig = &self.service.config().auth;
        JwtService::from_config(auth)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// JSON request, optionally authenticated
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        parts: &[PartSpec<'_>],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    pub async fn signup(&self, name: &str, email: &str) -> TestUser {
        let (status, body) = self
            .post(
                "/api/v1/auth/signup",
                None,
                json!({"name": name, "email": email, "password": "password123"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        TestUser {
            id: body["data"]["user"]["_id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Create an OfferSkill listing and return its id
    pub async fn create_listing(&self, owner: &TestUser, title: &str) -> String {
        self.create_listing_with(owner, json!({"title": title})).await
    }

    pub async fn create_listing_with(&self, owner: &TestUser, overrides: Value) -> String {
        let mut body = json!({
            "listingType": "OfferSkill",
            "title": "Guitar lessons",
            "description": "Beginner friendly guitar lessons",
            "category": "Music",
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut body, overrides) {
            base.extend(extra);
        }
        let (status, body) = self
            .post("/api/v1/listings", Some(&owner.token), body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "listing failed: {body}");
        body["data"]["listing"]["_id"].as_str().unwrap().to_string()
    }
}

pub fn multipart_body(parts: &[PartSpec<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            PartSpec::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            PartSpec::File {
                field,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        field, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
