//! Axum HTTP server implementation

use crate::core::config::MediaBackend;
use crate::core::service::{CommonGoodService, ServiceError};
use crate::http::auth::auth_middleware;
use crate::http::errors::set_expose_internal_errors;
use crate::http::handlers::{auth, conversations, listings, reviews, status, users, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Prefix of every API route
pub const API_PREFIX: &str = "/api/v1";

/// Build the full application router for `service`
pub fn build_router(service: Arc<CommonGoodService>) -> Router {
    let config = service.config().clone();
    set_expose_internal_errors(config.environment.is_development());
    let state = AppState::new(service);

    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/users/:userId", get(users::get_user))
        .route("/listings", get(listings::list_listings))
        .route("/listings/:listingId", get(listings::get_listing))
        .route("/reviews/user/:userId", get(reviews::reviews_for_user))
        .route("/reviews/listing/:listingId", get(reviews::reviews_for_listing))
        .route("/status", get(status::status));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/users/updateMe", patch(users::update_me))
        .route("/users/updateMyPassword", patch(users::update_my_password))
        .route("/listings", post(listings::create_listing))
        .route(
            "/listings/:listingId",
            patch(listings::update_listing).delete(listings::delete_listing),
        )
        .route(
            "/conversations",
            post(conversations::start_conversation).get(conversations::list_conversations),
        )
        .route(
            "/conversations/:conversationId/messages",
            get(conversations::get_messages).post(conversations::send_message),
        )
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/:reviewId", delete(reviews::delete_review))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut router = Router::new()
        .route("/", get(status::root))
        .nest(API_PREFIX, public.merge(protected));

    let media = &config.media;
    if media.backend == MediaBackend::Local && media.public_base_url.starts_with('/') {
        let mount = media.public_base_url.trim_end_matches('/');
        if mount.is_empty() {
            warn!("Not serving local media at the site root");
        } else {
            info!("Serving local media from {} at {}", media.local_dir.display(), mount);
            router = router.nest_service(mount, ServeDir::new(&media.local_dir));
        }
    }

    router
        .fallback(status::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(&config.server.allowed_origins)),
        )
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .with_state(state)
}

/// CORS for the configured origins; none configured allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// CommonGood HTTP server
pub struct CommonGoodServer {
    service: Arc<CommonGoodService>,
    addr: SocketAddr,
}

impl CommonGoodServer {
    pub fn new(service: Arc<CommonGoodService>, host: &str, port: u16) -> Result<Self, ServiceError> {
        let addr = Self::parse_address(host, port).map_err(ServiceError::Config)?;
        Ok(Self { service, addr })
    }

    /// Server for the host and port in the service configuration
    pub fn from_config(service: Arc<CommonGoodService>) -> Result<Self, ServiceError> {
        let server = &service.config().server;
        let (host, port) = (server.host.clone(), server.port);
        Self::new(service, &host, port)
    }

    /// Parse and normalize host:port into a SocketAddr
    fn parse_address(host: &str, port: u16) -> Result<SocketAddr, String> {
        let host = match host {
            "localhost" => "127.0.0.1",
            "[::1]" => "::1",
            "[::]" => "::",
            other => other,
        };
        let addr = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        addr.parse().map_err(|_| {
            format!(
                "Unable to parse address '{}'. Use an IP address such as '127.0.0.1' or '0.0.0.0'",
                addr
            )
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<(), ServiceError> {
        let app = build_router(self.service);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServiceError::Internal(format!("Failed to bind {}: {}", self.addr, e)))?;
        let bound = listener
            .local_addr()
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        info!("CommonGood API listening on http://{}{}", bound, API_PREFIX);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServiceError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, finishing in-flight requests");
}
