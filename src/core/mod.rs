//! Core service layer modules

pub mod config;
pub mod geo;
pub mod listings;
pub mod messaging;
pub mod models;
pub mod password;
pub mod query;
pub mod reviews;
pub mod service;
pub mod users;

// Re-export main types for convenience
pub use config::{AppConfig, Environment, MediaBackend};
pub use geo::GeoPoint;
pub use listings::{ListingPage, ListingService};
pub use messaging::MessagingService;
pub use models::*;
pub use query::{FieldSelection, QueryError, QueryFeatures};
pub use reviews::{ListingReviews, ReviewService, UserReviews};
pub use service::{CommonGoodService, FieldError, ServiceError, PERMISSION_DENIED};
pub use users::UserService;
