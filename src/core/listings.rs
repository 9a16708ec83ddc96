//! Listing browse, create, update and delete with photo management

use crate::core::models::{Listing, ListingPatch, ListingStatus, NewListing, Photo, User};
use crate::core::query::QueryFeatures;
use crate::core::service::{ServiceError, PERMISSION_DENIED};
use crate::storage::listings::LISTING_SCHEMA;
use crate::storage::media::{listing_photo_folder, MediaStorage, UploadedImage, LISTING_PHOTO_RULES};
use crate::storage::Store;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

const LISTING_NOT_FOUND: &str = "No listing found with that ID.";

/// One page of listings, already projected by the `fields` parameter
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub listings: Vec<Value>,
    /// Matches across all pages
    pub total: u64,
}

pub struct ListingService<'a> {
    store: &'a Store,
    media: &'a dyn MediaStorage,
}

impl<'a> ListingService<'a> {
    pub fn new(store: &'a Store, media: &'a dyn MediaStorage) -> Self {
        Self { store, media }
    }

    /// Browse listings. Only active listings unless the query filters `status` itself.
    pub async fn list(&self, params: &[(String, String)]) -> Result<ListingPage, ServiceError> {
        let mut features = QueryFeatures::parse(params, &LISTING_SCHEMA)?;
        features.default_filter(&LISTING_SCHEMA, "status", ListingStatus::Active.as_str())?;

        let (listings, total) = self.store.search_listings(&features).await?;
        Ok(ListingPage {
            listings: features.fields.project_all(&listings),
            total,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Listing, ServiceError> {
        self.store
            .find_listing(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(LISTING_NOT_FOUND.to_string()))
    }

    /// Create a listing owned by `owner`.
    ///
    /// Without coordinates the owner's are used, along with the owner's location
    /// text when none was given.
    pub async fn create(
        &self,
        owner: &User,
        mut new: NewListing,
        photos: Vec<UploadedImage>,
    ) -> Result<Listing, ServiceError> {
        new.owner = owner.id;
        if new.coordinates.is_none() {
            if let Some(point) = owner.coordinates {
                new.coordinates = Some(point);
                if new.location.is_none() {
                    new.location = owner.location.clone();
                }
            }
        }

        new.photos = self.upload_photos(owner.id, &photos).await?;
        match self.store.insert_listing(&new).await {
            Ok(listing) => {
                info!("User {} created listing {}", owner.id, listing.id);
                Ok(listing)
            }
            Err(e) => {
                self.discard(&new.photos).await;
                Err(e.into())
            }
        }
    }

    /// Update a listing the user owns. New photos are appended; `remove_photos`
    /// ids are dropped from the listing and then from media storage.
    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        mut patch: ListingPatch,
        photos: Vec<UploadedImage>,
    ) -> Result<Listing, ServiceError> {
        let listing = self.get(id).await?;
        ensure_owner(user, &listing)?;

        patch.add_photos = self.upload_photos(user.id, &photos).await?;
        let update = match self.store.update_listing(id, &patch).await {
            Ok(Some(update)) => update,
            result => {
                self.discard(&patch.add_photos).await;
                return match result {
                    Err(e) => Err(e.into()),
                    _ => Err(ServiceError::NotFound(LISTING_NOT_FOUND.to_string())),
                };
            }
        };

        self.discard(&update.removed_photos).await;
        Ok(update.listing)
    }

    /// Delete a listing the user owns along with its photos
    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), ServiceError> {
        let listing = self.get(id).await?;
        ensure_owner(user, &listing)?;

        if !self.store.delete_listing(id).await? {
            return Err(ServiceError::NotFound(LISTING_NOT_FOUND.to_string()));
        }
        self.discard(&listing.photos).await;
        info!("User {} deleted listing {}", user.id, id);
        Ok(())
    }

    /// Validate and upload all images, removing the ones already stored if any fails
    async fn upload_photos(
        &self,
        owner: Uuid,
        images: &[UploadedImage],
    ) -> Result<Vec<Photo>, ServiceError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        LISTING_PHOTO_RULES.check_all(images)?;

        let folder = listing_photo_folder(owner, Utc::now().timestamp_millis());
        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            match self
                .media
                .upload(&folder, image, LISTING_PHOTO_RULES.transform)
                .await
            {
                Ok(photo) => stored.push(photo),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e.into());
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal from media storage
    async fn discard(&self, photos: &[Photo]) {
        if photos.is_empty() {
            return;
        }
        let ids: Vec<String> = photos.iter().map(|p| p.public_id.clone()).collect();
        let failed = self.media.delete_many(&ids).await;
        if !failed.is_empty() {
            warn!("{} photo(s) could not be removed from media storage", failed.len());
        }
    }
}

fn ensure_owner(user: &User, listing: &Listing) -> Result<(), ServiceError> {
    if listing.user.id == user.id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(PERMISSION_DENIED.to_string()))
    }
}
