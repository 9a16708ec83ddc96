//! Main CommonGood service: shared error type and the facade over all domain services

use crate::core::config::AppConfig;
use crate::core::listings::ListingService;
use crate::core::messaging::MessagingService;
use crate::core::query::QueryError;
use crate::core::reviews::ReviewService;
use crate::core::users::UserService;
use crate::storage::media::{create_media_storage, MediaError, MediaStorage};
use crate::storage::{Store, StoreCounts, StoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Service error types
///
/// Variants carrying user-facing text (`Validation`, `NotFound`, `Forbidden`,
/// `Unauthorized`) display the text verbatim.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Media storage error: {0}")]
    Media(String),

    #[error("{0}")]
    Validation(String),

    #[error("Validation Error")]
    InvalidFields(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Duplicate field value: {0}. Please use another value!")]
    Duplicate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(value) => ServiceError::Duplicate(value),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

impl From<MediaError> for ServiceError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rejected(msg) => ServiceError::Validation(msg),
            other => ServiceError::Media(other.to_string()),
        }
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Message used whenever the acting user does not own the resource
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// Main CommonGood service
///
/// Owns the store and media backend; the per-domain services borrow them.
pub struct CommonGoodService {
    config: AppConfig,
    store: Store,
    media: Arc<dyn MediaStorage>,
}

impl CommonGoodService {
    /// Open the configured database and media backend
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        crate::init_logging();
        info!("Initializing CommonGood service v{}", crate::VERSION);

        let store = Store::open(&config.database.path).await?;
        let media = create_media_storage(&config.media)?;
        info!(
            "Using database {} and {} media storage",
            config.database.path.display(),
            media.backend_name()
        );

        Ok(Self::with_parts(config, store, media))
    }

    /// Assemble a service from already constructed parts
    pub fn with_parts(config: AppConfig, store: Store, media: Arc<dyn MediaStorage>) -> Self {
        Self {
            config,
            store,
            media,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn media(&self) -> &Arc<dyn MediaStorage> {
        &self.media
    }

    pub fn users(&self) -> UserService<'_> {
        UserService::new(&self.store, self.media.as_ref())
    }

    pub fn listings(&self) -> ListingService<'_> {
        ListingService::new(&self.store, self.media.as_ref())
    }

    pub fn messaging(&self) -> MessagingService<'_> {
        MessagingService::new(&self.store)
    }

    pub fn reviews(&self) -> ReviewService<'_> {
        ReviewService::new(&self.store)
    }

    /// Row counts reported by the status endpoint
    pub async fn counts(&self) -> Result<StoreCounts, ServiceError> {
        Ok(self.store.counts().await?)
    }
}
