//! Image storage for listing photos and profile pictures

pub mod cloudinary;
pub mod local;

use crate::core::config::{MediaBackend, MediaConfig};
use crate::core::models::Photo;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub use cloudinary::CloudinaryStorage;
pub use local::LocalMediaStorage;

/// Root folder for everything this application stores
pub const MEDIA_ROOT: &str = "commongood";

/// Extensions accepted for uploaded images
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Error)]
pub enum MediaError {
    /// Client-side problem with the upload itself
    #[error("{0}")]
    Rejected(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid public id: {0}")]
    InvalidPublicId(String),
}

/// An image received from a client
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// Lower-cased file extension, if any
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Resize applied by backends that transform on upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransform {
    pub width: u32,
    pub height: u32,
    pub crop: &'static str,
    pub gravity: Option<&'static str>,
}

impl ImageTransform {
    /// Cloudinary transformation string, e.g. `w_800,h_600,c_limit`
    pub fn to_param(&self) -> String {
        let mut param = format!("w_{},h_{},c_{}", self.width, self.height, self.crop);
        if let Some(gravity) = self.gravity {
            param.push_str(",g_");
            param.push_str(gravity);
        }
        param
    }
}

pub const LISTING_PHOTO_TRANSFORM: ImageTransform = ImageTransform {
    width: 800,
    height: 600,
    crop: "limit",
    gravity: None,
};

pub const PROFILE_PICTURE_TRANSFORM: ImageTransform = ImageTransform {
    width: 250,
    height: 250,
    crop: "fill",
    gravity: Some("face"),
};

/// Limits enforced on one upload field
#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    /// Multipart field name
    pub field: &'static str,
    pub max_bytes: usize,
    pub max_files: usize,
    pub transform: ImageTransform,
}

pub const LISTING_PHOTO_RULES: UploadRules = UploadRules {
    field: "photos",
    max_bytes: 10 * 1024 * 1024,
    max_files: 5,
    transform: LISTING_PHOTO_TRANSFORM,
};

pub const PROFILE_PICTURE_RULES: UploadRules = UploadRules {
    field: "profilePicture",
    max_bytes: 5 * 1024 * 1024,
    max_files: 1,
    transform: PROFILE_PICTURE_TRANSFORM,
};

impl UploadRules {
    pub fn check(&self, image: &UploadedImage) -> Result<(), MediaError> {
        if !image.content_type.starts_with("image/") {
            return Err(MediaError::Rejected(
                "Not an image! Please upload only images.".to_string(),
            ));
        }
        match image.extension() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(MediaError::Rejected(
                    "Only jpg, jpeg, png, gif and webp images are allowed.".to_string(),
                ))
            }
        }
        if image.bytes.len() > self.max_bytes {
            return Err(MediaError::Rejected(format!(
                "File too large. Maximum size is {} MB.",
                self.max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    pub fn check_all(&self, images: &[UploadedImage]) -> Result<(), MediaError> {
        if images.len() > self.max_files {
            return Err(MediaError::Rejected(format!(
                "Too many files for field '{}'. Maximum is {}.",
                self.field, self.max_files
            )));
        }
        images.iter().try_for_each(|image| self.check(image))
    }
}

/// `commongood/listing_photos/<userId>/<millis>`
pub fn listing_photo_folder(user: Uuid, millis: i64) -> String {
    format!("{}/listing_photos/{}/{}", MEDIA_ROOT, user, millis)
}

/// `commongood/user_profiles/<userId>`
pub fn profile_picture_folder(user: Uuid) -> String {
    format!("{}/user_profiles/{}", MEDIA_ROOT, user)
}

/// Pluggable image store
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store `image` under `folder` and return its public URL and id
    async fn upload(
        &self,
        folder: &str,
        image: &UploadedImage,
        transform: ImageTransform,
    ) -> Result<Photo, MediaError>;

    /// Remove a stored image; unknown ids are not an error
    async fn delete(&self, public_id: &str) -> Result<(), MediaError>;

    /// Remove several images, returning the ids that could not be deleted
    async fn delete_many(&self, public_ids: &[String]) -> Vec<String> {
        let mut failed = Vec::new();
        for id in public_ids {
            if let Err(e) = self.delete(id).await {
                warn!("Failed to delete media {}: {}", id, e);
                failed.push(id.clone());
            }
        }
        failed
    }

    fn backend_name(&self) -> &'static str;
}

/// Build the backend selected in configuration
pub fn create_media_storage(config: &MediaConfig) -> Result<Arc<dyn MediaStorage>, MediaError> {
    match config.backend {
        MediaBackend::Local => Ok(Arc::new(LocalMediaStorage::new(
            config.local_dir.clone(),
            config.public_base_url.clone(),
        )?)),
        MediaBackend::Cloudinary => Ok(Arc::new(CloudinaryStorage::new(&config.cloudinary)?)),
    }
}
