//! Review handlers

use crate::http::auth::AuthContext;
use crate::http::errors::HttpResult;
use crate::http::form::BodyInput;
use crate::http::handlers::{parse_path_id, AppState};
use crate::http::models::{
    ApiResponse, CreateReviewRequest, ListingReviewsData, ReviewData, UserReviewsData,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

/// POST /api/v1/reviews
pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthContext,
    body: BodyInput,
) -> HttpResult<(StatusCode, Json<ApiResponse<ReviewData>>)> {
    body.ensure_only_files(&[])?;
    let input = body.parse::<CreateReviewRequest>()?.into_input()?;

    let review = state
        .service
        .reviews()
        .create(
            &auth.user,
            input.listing,
            input.reviewee,
            input.rating,
            &input.comment,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ReviewData { review })),
    ))
}

/// GET /api/v1/reviews/user/:userId
pub async fn reviews_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> HttpResult<Json<ApiResponse<UserReviewsData>>> {
    let id = parse_path_id("userId", &user_id)?;
    let found = state.service.reviews().for_user(id, &params).await?;
    let results = found.reviews.len();
    Ok(Json(
        ApiResponse::success(UserReviewsData {
            reviewee: found.reviewee,
            reviews: found.reviews,
        })
        .with_results(results),
    ))
}

/// GET /api/v1/reviews/listing/:listingId
pub async fn reviews_for_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> HttpResult<Json<ApiResponse<ListingReviewsData>>> {
    let id = parse_path_id("listingId", &listing_id)?;
    let found = state.service.reviews().for_listing(id, &params).await?;
    let results = found.reviews.len();
    Ok(Json(
        ApiResponse::success(ListingReviewsData {
            listing: found.listing,
            reviews: found.reviews,
        })
        .with_results(results),
    ))
}

/// DELETE /api/v1/reviews/:reviewId
pub async fn delete_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(review_id): Path<String>,
) -> HttpResult<StatusCode> {
    let id = parse_path_id("reviewId", &review_id)?;
    state.service.reviews().delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
