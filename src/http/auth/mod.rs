//! JWT authentication

pub mod jwt;
pub mod middleware;

pub use crate::http::models::Claims;
pub use jwt::JwtService;
pub use middleware::{auth_middleware, AuthContext};
