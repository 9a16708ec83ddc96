//! HTTP error handling and conversion

use crate::core::service::{FieldError, ServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Shown instead of internal error details outside development
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Whether 5xx responses carry the underlying error message
pub fn set_expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

/// HTTP error types
#[derive(Debug, Clone)]
pub enum HttpError {
    BadRequest(String),
    /// Per-field validation failures
    Validation(Vec<FieldError>),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl HttpError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) | HttpError::Validation(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `fail` for client errors, `error` for server errors
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_server_error() {
            "error"
        } else {
            "fail"
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Validation(_) => write!(f, "Validation Error"),
            HttpError::BadRequest(msg)
            | HttpError::Unauthorized(msg)
            | HttpError::Forbidden(msg)
            | HttpError::NotFound(msg)
            | HttpError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let label = self.status_label();

        let body = match self {
            HttpError::Validation(details) => json!({
                "status": label,
                "message": "Validation Error",
                "details": details,
            }),
            HttpError::Internal(msg) => {
                error!("Internal error: {}", msg);
                let message = if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
                    msg
                } else {
                    GENERIC_ERROR_MESSAGE.to_string()
                };
                json!({ "status": label, "message": message })
            }
            HttpError::BadRequest(msg)
            | HttpError::Unauthorized(msg)
            | HttpError::Forbidden(msg)
            | HttpError::NotFound(msg) => json!({ "status": label, "message": msg }),
        };

        (status, Json(body)).into_response()
    }
}

/// Convert service errors to HTTP errors
impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => HttpError::BadRequest(msg),
            ServiceError::InvalidFields(fields) => HttpError::Validation(fields),
            ServiceError::Duplicate(_) => HttpError::BadRequest(err.to_string()),
            ServiceError::NotFound(msg) => HttpError::NotFound(msg),
            ServiceError::Forbidden(msg) => HttpError::Forbidden(msg),
            ServiceError::Unauthorized(msg) => HttpError::Unauthorized(msg),
            ServiceError::Storage(_)
            | ServiceError::Media(_)
            | ServiceError::Config(_)
            | ServiceError::Internal(_) => HttpError::Internal(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for HttpError {
    fn from(errors: ValidationErrors) -> Self {
        HttpError::Validation(field_errors(&errors))
    }
}

/// Flatten `validator` output into field errors, first message per field,
/// ordered by field name
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .errors()
        .iter()
        .filter_map(|(field, kind)| match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}.", camel_case(field)));
                FieldError::new(camel_case(field), message)
            }),
            _ => None,
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Result type alias for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;
