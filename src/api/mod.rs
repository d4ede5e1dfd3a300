pub mod handlers;
pub mod models;
pub mod openapi;

use crate::auth::jwt::JwtService;
use crate::core::services::LedgerService;
use crate::infrastructure::cache::in_memory::InMemoryShapeCache;
use crate::infrastructure::notifications::in_memory::InMemoryNotifier;
use crate::infrastructure::storage::shaped::ShapedStorage;
use crate::infrastructure::store::in_memory::InMemoryStore;

pub type AppStorage = ShapedStorage<InMemoryStore, InMemoryShapeCache>;
pub type AppService = LedgerService<AppStorage, InMemoryNotifier, JwtService>;

use axum::Router;
use http::{Method, header};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Full HTTP surface: the ledger routes under `/api` plus the OpenAPI UI.
pub fn build_router(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/", axum::routing::get(|| async { "OK" }))
        .nest("/api", handlers::api_routes(service))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
}
