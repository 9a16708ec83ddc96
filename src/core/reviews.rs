//! Reviews left after an exchange and the reviewee's rating summary

use crate::core::models::{ListingSummary, NewReview, Review, RevieweeSummary, User};
use crate::core::query::QueryFeatures;
use crate::core::service::{FieldError, ServiceError, PERMISSION_DENIED};
use crate::storage::reviews::{ReviewScope, REVIEW_SCHEMA};
use crate::storage::{Store, StoreError};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Reviews received by one user
#[derive(Debug, Clone)]
pub struct UserReviews {
    pub reviewee: RevieweeSummary,
    pub reviews: Vec<Value>,
}

/// Reviews attached to one listing
#[derive(Debug, Clone)]
pub struct ListingReviews {
    pub listing: ListingSummary,
    pub reviews: Vec<Value>,
}

pub struct ReviewService<'a> {
    store: &'a Store,
}

impl<'a> ReviewService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        reviewer: &User,
        listing: Uuid,
        reviewee: Uuid,
        rating: i64,
        comment: &str,
    ) -> Result<Review, ServiceError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ServiceError::InvalidFields(vec![FieldError::new(
                "rating",
                "Rating must be an integer between 1 and 5.",
            )]));
        }
        if self.store.find_listing(listing).await?.is_none() {
            return Err(ServiceError::NotFound("Listing not found.".to_string()));
        }
        if self.store.find_user(reviewee).await?.is_none() {
            return Err(ServiceError::NotFound(
                "User being reviewed (reviewee) not found.".to_string(),
            ));
        }
        if reviewee == reviewer.id {
            return Err(ServiceError::Validation("You cannot review yourself.".to_string()));
        }

        let new = NewReview {
            listing,
            reviewer: reviewer.id,
            reviewee,
            rating,
            comment: comment.trim().to_string(),
        };
        match self.store.insert_review(&new).await {
            Ok(review) => {
                info!("User {} reviewed {} for listing {}", reviewer.id, reviewee, listing);
                Ok(review)
            }
            Err(StoreError::Duplicate(_)) => Err(ServiceError::Validation(
                "You have already reviewed this user for this listing.".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn for_user(
        &self,
        user: Uuid,
        params: &[(String, String)],
    ) -> Result<UserReviews, ServiceError> {
        let features = QueryFeatures::parse(params, &REVIEW_SCHEMA)?;
        let reviewee = self
            .store
            .find_user(user)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No user found with that ID.".to_string()))?;

        let reviews = self
            .store
            .list_reviews(ReviewScope::Reviewee(user), &features)
            .await?;
        Ok(UserReviews {
            reviewee: RevieweeSummary::from(&reviewee),
            reviews: features.fields.project_all(&reviews),
        })
    }

    pub async fn for_listing(
        &self,
        listing: Uuid,
        params: &[(String, String)],
    ) -> Result<ListingReviews, ServiceError> {
        let features = QueryFeatures::parse(params, &REVIEW_SCHEMA)?;
        let found = self
            .store
            .find_listing(listing)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No listing found with that ID.".to_string()))?;

        let reviews = self
            .store
            .list_reviews(ReviewScope::Listing(listing), &features)
            .await?;
        Ok(ListingReviews {
            listing: ListingSummary {
                id: found.id,
                title: found.title,
                user: found.user.id,
            },
            reviews: features.fields.project_all(&reviews),
        })
    }

    /// Remove a review written by `user`; the reviewee's rating is recomputed
    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), ServiceError> {
        let not_found = || ServiceError::NotFound("No review found with that ID.".to_string());
        let review = self.store.find_review(id).await?.ok_or_else(not_found)?;
        if review.reviewer.id != user.id {
            return Err(ServiceError::Forbidden(PERMISSION_DENIED.to_string()));
        }
        self.store.delete_review(id).await?.ok_or_else(not_found)?;
        Ok(())
    }
}
