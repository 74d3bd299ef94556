// src/bin/api_server.rs

use std::sync::Arc;
use stock_ledger::infra::config::{AppConfig, StorageBackend};
use stock_ledger::transport;
use stock_ledger::{CrudEngine, MemoryRowStore, PgRowStore, RowStore};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;
    config.logging.init();

    // --- Store Initialization ---
    let store: Arc<dyn RowStore> = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            info!(max_connections = config.max_connections, "connecting to PostgreSQL");
            let store = PgRowStore::connect(database_url, config.max_connections).await?;
            store.ensure_schema().await?;
            info!("schema ensured");
            Arc::new(store)
        }
        StorageBackend::Memory => {
            warn!("using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryRowStore::new())
        }
    };

    let app_state = transport::http::AppState::new(CrudEngine::new(store), config.app_name.as_str());

    // --- API Server Initialization ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "API server listening");
    info!("Swagger UI available at /swagger-ui");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received (Ctrl+C)");
        }
    }

    Ok(())
}
