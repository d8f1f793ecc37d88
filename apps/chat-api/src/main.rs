use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::config::{Config, StoreKind};
use chat_api::db::{ChatStore, MemoryStore, PgStore};
use chat_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env().and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };
    let port = config.port;

    let store: Arc<dyn ChatStore> = match config.store {
        StoreKind::Postgres => match chat_api::db::pool::connect(&config.database_url).await {
            Ok(pool) => Arc::new(PgStore::new(pool)),
            Err(err) => {
                tracing::error!(%err, "failed to build database pool");
                std::process::exit(1);
            }
        },
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; messages and presence are not persisted");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        app_env = %config.app_env,
        store = ?config.store,
        require_channel_membership = config.require_channel_membership,
        "chat-api configured"
    );

    let state = AppState::new(config, store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
