//! REST API for CommonGood
//!
//! Axum routes under `/api/v1`, JWT bearer authentication and the JSON
//! envelopes the web client expects.

pub mod auth;
pub mod errors;
pub mod form;
pub mod handlers;
pub mod models;
pub mod server;

pub use errors::{HttpError, HttpResult};
pub use models::ApiResponse;
pub use server::{build_router, CommonGoodServer, API_PREFIX};
