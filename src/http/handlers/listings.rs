//! Listing browse and CRUD handlers

use crate::core::models::Listing;
use crate::http::auth::AuthContext;
use crate::http::errors::HttpResult;
use crate::http::form::BodyInput;
use crate::http::handlers::{parse_path_id, AppState};
use crate::http::models::{
    ApiResponse, CreateListingRequest, ListingData, ListingsData, UpdateListingRequest,
};
use crate::storage::media::LISTING_PHOTO_RULES;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

/// GET /api/v1/listings
pub async fn list_listings(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> HttpResult<Json<ApiResponse<ListingsData>>> {
    let page = state.service.listings().list(&params).await?;
    let results = page.listings.len();
    Ok(Json(
        ApiResponse::success(ListingsData {
            listings: page.listings,
        })
        .with_results(results)
        .with_total(page.total),
    ))
}

/// GET /api/v1/listings/:listingId
pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> HttpResult<Json<ApiResponse<ListingData<Listing>>>> {
    let id = parse_path_id("listingId", &listing_id)?;
    let listing = state.service.listings().get(id).await?;
    Ok(Json(ApiResponse::success(ListingData { listing })))
}

/// POST /api/v1/listings
pub async fn create_listing(
    State(state): State<AppState>,
    auth: AuthContext,
    mut body: BodyInput,
) -> HttpResult<(StatusCode, Json<ApiResponse<ListingData<Listing>>>)> {
    body.ensure_only_files(&[LISTING_PHOTO_RULES.field])?;
    let new = body.parse::<CreateListingRequest>()?.into_new_listing()?;
    let photos = body.files_for(LISTING_PHOTO_RULES.field);

    let listing = state
        .service
        .listings()
        .create(&auth.user, new, photos)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ListingData { listing })),
    ))
}

/// PATCH /api/v1/listings/:listingId
pub async fn update_listing(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(listing_id): Path<String>,
    mut body: BodyInput,
) -> HttpResult<Json<ApiResponse<ListingData<Listing>>>> {
    let id = parse_path_id("listingId", &listing_id)?;
    body.ensure_only_files(&[LISTING_PHOTO_RULES.field])?;
    let patch = body.parse::<UpdateListingRequest>()?.into_patch()?;
    let photos = body.files_for(LISTING_PHOTO_RULES.field);

    let listing = state
        .service
        .listings()
        .update(&auth.user, id, patch, photos)
        .await?;
    Ok(Json(ApiResponse::success(ListingData { listing })))
}

/// DELETE /api/v1/listings/:listingId
pub async fn delete_listing(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(listing_id): Path<String>,
) -> HttpResult<StatusCode> {
    let id = parse_path_id("listingId", &listing_id)?;
    state.service.listings().delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
