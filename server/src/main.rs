mod config;
mod db;
mod resources;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::store::{MemoryStore, PgStore, RecordStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid server configuration");

    let store: Arc<dyn RecordStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::init_pool(database_url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!(max_connections = config.db_max_connections, "postgres store ready");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = state::AppState::new(store, config.page_limits);
    let app = routes::app(state);

    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "crm api listening");
    axum::serve(listener, app).await.expect("server failed");
}
