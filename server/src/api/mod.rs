//! API Router and Application State
//!
//! Central routing configuration and shared state.

pub mod error;
pub mod messages;
pub mod service;

use std::sync::Arc;

use axum::http::Uri;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    db::Message,
    delivery::{DeliveryCache, Scheduler},
};
pub use error::{ApiError, ErrorResponse};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Delivery scheduler
    pub scheduler: Arc<Scheduler>,
    /// Delivery cache (`None` when Redis is unavailable)
    pub cache: Option<Arc<dyn DeliveryCache>>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        scheduler: Arc<Scheduler>,
        cache: Option<Arc<dyn DeliveryCache>>,
        config: Config,
    ) -> Self {
        Self {
            scheduler,
            cache,
            config: Arc::new(config),
        }
    }

    /// Check if the delivery cache is configured and available.
    #[must_use]
    pub const fn has_cache(&self) -> bool {
        self.cache.is_some()
    }
}

/// `OpenAPI` document for the public API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier API",
        description = "Scheduled webhook delivery of queued messages"
    ),
    paths(
        service::control_service,
        service::service_status,
        messages::list_sent_messages,
        messages::get_cached_delivery,
    ),
    components(schemas(
        Message,
        ErrorResponse,
        service::ServiceControlResponse,
        service::ServiceStatusResponse,
        messages::MessageListResponse,
        messages::DeliveryLookupResponse,
    )),
    tags(
        (name = "service", description = "Delivery service lifecycle"),
        (name = "messages", description = "Sent messages and delivery lookups"),
    )
)]
pub struct ApiDoc;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/api/service", post(service::control_service))
        .route("/api/service/status", get(service::service_status))
        .route("/api/messages", get(messages::list_sent_messages))
        .route(
            "/api/deliveries/{delivery_id}",
            get(messages::get_cached_delivery),
        );

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(api_routes)
        // API documentation
        .merge(api_docs())
        .fallback(not_found)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether delivery ids are being cached
    cache_enabled: bool,
    /// Whether webhook calls are simulated
    dry_run: bool,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache_enabled: state.has_cache(),
        dry_run: state.config.dry_run,
    })
}

/// Unmatched routes.
async fn not_found(uri: Uri) -> ApiError {
    tracing::debug!(path = %uri.path(), "Route not found");
    ApiError::NotFound("Page not found".to_string())
}

/// API documentation routes.
fn api_docs() -> Router<AppState> {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
