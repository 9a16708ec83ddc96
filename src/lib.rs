//! # CommonGood
//!
//! Backend for a community bartering marketplace: members post listings that
//! offer or request skills and items, browse them with filters, text search and
//! geographic radius queries, message each other about exchanges and review
//! one another afterwards.
//!
//! ## Architecture
//!
//! - [`storage`]: SQLite persistence and pluggable photo storage (local disk
//!   or Cloudinary)
//! - [`core`]: configuration, query features and the domain services
//! - [`http`]: the axum REST API under `/api/v1`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use commongood::{AppConfig, CommonGoodServer, CommonGoodService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load(None)?;
//!     let service = Arc::new(CommonGoodService::new(config).await?);
//!
//!     let page = service.listings().list(&[("category".into(), "Music".into())]).await?;
//!     println!("{} active music listings", page.total);
//!
//!     CommonGoodServer::from_config(service)?.serve().await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod http;
pub mod storage;

pub use crate::core::config::{AppConfig, Environment, MediaBackend};
pub use crate::core::query::{QueryError, QueryFeatures};
pub use crate::core::service::{CommonGoodService, FieldError, ServiceError};
pub use crate::http::{build_router, CommonGoodServer};
pub use crate::storage::media::{MediaError, MediaStorage};
pub use crate::storage::{Store, StoreError};

/// Version of the CommonGood API
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging (safe for testing)
pub fn init_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "commongood=info,tower_http=info".into());

        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

        // fails silently if a subscriber is already installed
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
