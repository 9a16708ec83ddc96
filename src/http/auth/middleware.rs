//! Axum middleware for JWT authentication

use crate::core::models::User;
use crate::http::auth::jwt::INVALID_TOKEN;
use crate::http::errors::HttpError;
use crate::http::handlers::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

/// The authenticated user, attached to protected requests
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

/// Bearer token from the Authorization header
pub fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Require a valid token whose user still exists and has not changed
/// password since the token was issued
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = extract_token(req.headers()).ok_or_else(|| {
        HttpError::Unauthorized("You are not logged in! Please log in to get access.".to_string())
    })?;

    let claims = state.jwt_service.validate_token(&token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| HttpError::Unauthorized(INVALID_TOKEN.to_string()))?;

    let user = state.service.users().find(user_id).await?.ok_or_else(|| {
        HttpError::Unauthorized(
            "The user belonging to this token does no longer exist.".to_string(),
        )
    })?;

    if user.changed_password_after(claims.iat) {
        debug!("Rejecting token for {} issued before a password change", user.id);
        return Err(HttpError::Unauthorized(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    req.extensions_mut().insert(AuthContext { user });
    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
            HttpError::Unauthorized(
                "You are not logged in! Please log in to get access.".to_string(),
            )
        })
    }
}
