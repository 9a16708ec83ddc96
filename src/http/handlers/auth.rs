//! Signup, login and the current account

use crate::core::models::User;
use crate::http::auth::AuthContext;
use crate::http::errors::HttpResult;
use crate::http::form::BodyInput;
use crate::http::handlers::AppState;
use crate::http::models::{ApiResponse, LoginRequest, SignupRequest, UserData};
use axum::{extract::State, http::StatusCode, Json};

/// Token plus the account, as returned by signup, login and password changes
pub(crate) fn token_response(state: &AppState, user: &User) -> HttpResult<ApiResponse<UserData>> {
    let token = state.jwt_service.generate_token(user.id)?;
    Ok(ApiResponse::success(UserData::own(user)?).with_token(token))
}

/// POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    body: BodyInput,
) -> HttpResult<(StatusCode, Json<ApiResponse<UserData>>)> {
    body.ensure_only_files(&[])?;
    let (name, email, password) = body.parse::<SignupRequest>()?.into_parts()?;

    let user = state.service.users().signup(&name, &email, &password).await?;
    Ok((StatusCode::CREATED, Json(token_response(&state, &user)?)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: BodyInput,
) -> HttpResult<Json<ApiResponse<UserData>>> {
    body.ensure_only_files(&[])?;
    let (email, password) = body.parse::<LoginRequest>()?.into_parts()?;

    let user = state.service.users().login(&email, &password).await?;
    Ok(Json(token_response(&state, &user)?))
}

/// GET /api/v1/auth/me
pub async fn me(auth: AuthContext) -> HttpResult<Json<ApiResponse<UserData>>> {
    Ok(Json(ApiResponse::success(UserData::own(&auth.user)?)))
}
