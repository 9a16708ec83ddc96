//! HTTP request handlers

pub mod auth;
pub mod conversations;
pub mod listings;
pub mod reviews;
pub mod status;
pub mod users;

pub use status::AppState;

use crate::http::errors::{HttpError, HttpResult};
use uuid::Uuid;

/// Parse an id taken from the URL path
pub(crate) fn parse_path_id(param: &str, raw: &str) -> HttpResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| {
        HttpError::BadRequest(format!("Invalid {} format in URL parameter.", param))
    })
}
