//! Status, root and fallback handlers

use crate::core::service::CommonGoodService;
use crate::http::auth::jwt::JwtService;
use crate::http::errors::{HttpError, HttpResult};
use crate::http::models::{ApiResponse, StatusResponse};
use axum::{extract::State, http::Uri, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::SystemTime;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CommonGoodService>,
    pub jwt_service: Arc<JwtService>,
    pub start_time: SystemTime,
}

impl AppState {
    pub fn new(service: Arc<CommonGoodService>) -> Self {
        let jwt_service = Arc::new(JwtService::from_config(&service.config().auth));
        Self {
            service,
            jwt_service,
            start_time: SystemTime::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_secs()
    }
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Welcome to the CommonGood API!",
        "data": {
            "version": crate::VERSION,
            "docs": "/api-docs",
        }
    }))
}

/// GET /api/v1/status
pub async fn status(State(state): State<AppState>) -> HttpResult<Json<ApiResponse<StatusResponse>>> {
    let counts = state.service.counts().await?;
    let environment = if state.service.config().environment.is_development() {
        "development"
    } else {
        "production"
    };

    Ok(Json(ApiResponse::success(StatusResponse {
        status: "running",
        version: crate::VERSION.to_string(),
        environment: environment.to_string(),
        uptime_seconds: state.uptime_seconds(),
        counts,
    })))
}

/// Any route nothing else matched
pub async fn not_found(uri: Uri) -> HttpError {
    HttpError::NotFound(format!("Can't find {} on this server!", uri.path()))
}
