use divvy::api::{AppService, build_router};
use divvy::auth::jwt::JwtService;
use divvy::config::CONFIG;
use divvy::core::services::LedgerService;
use divvy::infrastructure::cache::in_memory::InMemoryShapeCache;
use divvy::infrastructure::notifications::in_memory::InMemoryNotifier;
use divvy::infrastructure::schema::ShapeCatalog;
use divvy::infrastructure::storage::shaped::{ShapedStorage, standard_store};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&CONFIG.log_level)))
        .init();
    info!("starting with {:?}", *CONFIG);

    let storage = ShapedStorage::new(standard_store(), InMemoryShapeCache::new(), ShapeCatalog::standard()?);
    for shape in storage.verify().await? {
        info!("using table {}", shape.table);
    }

    let service: Arc<AppService> = Arc::new(LedgerService::new(
        storage,
        InMemoryNotifier::new(),
        JwtService::new(CONFIG.jwt_secret.clone()),
        CONFIG.money_scale,
    ));
    let app = build_router(service);

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], CONFIG.port));
    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
