//! Public profiles and account maintenance

use crate::core::service::ServiceError;
use crate::http::auth::AuthContext;
use crate::http::errors::HttpResult;
use crate::http::form::BodyInput;
use crate::http::handlers::{auth::token_response, parse_path_id, AppState};
use crate::http::models::{ApiResponse, UpdateMeRequest, UpdatePasswordRequest, UserData};
use crate::storage::media::PROFILE_PICTURE_RULES;
use axum::{
    extract::{Path, State},
    Json,
};

/// GET /api/v1/users/:userId
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> HttpResult<Json<ApiResponse<UserData>>> {
    let id = parse_path_id("userId", &user_id)?;
    let user = state.service.users().get(id).await?;
    Ok(Json(ApiResponse::success(UserData::public(&user)?)))
}

/// PATCH /api/v1/users/updateMe
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthContext,
    mut body: BodyInput,
) -> HttpResult<Json<ApiResponse<UserData>>> {
    body.ensure_only_files(&[PROFILE_PICTURE_RULES.field])?;
    let patch = body.parse::<UpdateMeRequest>()?.into_patch()?;

    let pictures = body.files_for(PROFILE_PICTURE_RULES.field);
    PROFILE_PICTURE_RULES
        .check_all(&pictures)
        .map_err(ServiceError::from)?;

    let user = state
        .service
        .users()
        .update_profile(&auth.user, patch, pictures.into_iter().next())
        .await?;
    Ok(Json(ApiResponse::success(UserData::own(&user)?)))
}

/// PATCH /api/v1/users/updateMyPassword
pub async fn update_my_password(
    State(state): State<AppState>,
    auth: AuthContext,
    body: BodyInput,
) -> HttpResult<Json<ApiResponse<UserData>>> {
    body.ensure_only_files(&[])?;
    let (current, new) = body.parse::<UpdatePasswordRequest>()?.into_parts()?;

    let user = state
        .service
        .users()
        .change_password(&auth.user, &current, &new)
        .await?;
    Ok(Json(token_response(&state, &user)?))
}
