//! Itemdesk Server - HTTP API for structured item records
//!
//! A thin shim mapping routes 1:1 onto `RecordService` operations.

pub mod auth;
pub mod config;
pub mod http;
pub mod seed;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use itemdesk_core::{Hooks, RecordService, RecordStore, SqliteRecordStore};

use crate::auth::ReadOnlyActors;
use crate::config::ServerConfig;

/// Shared application state
pub struct AppState {
    pub service: RecordService,
}

impl AppState {
    pub fn new(service: RecordService) -> Self {
        Self { service }
    }

    /// Open the configured store, build the service and seed samples.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn RecordStore> = match &config.database {
            Some(path) => {
                tracing::info!("Opening database at {:?}", path);
                Arc::new(SqliteRecordStore::open(path)?)
            }
            None => {
                tracing::info!("Using in-memory database");
                Arc::new(SqliteRecordStore::open_in_memory()?)
            }
        };

        let mut hooks = Hooks::default();
        let read_only = ReadOnlyActors::new(config.read_only_actors.iter().cloned());
        if !read_only.is_empty() {
            hooks = hooks.with_authorizer(Arc::new(read_only));
        }

        let service = RecordService::from_config(store, &config.core, hooks)?;
        if config.seed_samples {
            seed::seed_samples(&service)?;
        }
        Ok(Self::new(service))
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/items/details",
            get(http::list_details).post(http::create_details),
        )
        .route(
            "/api/items/{id}/details",
            get(http::get_details)
                .put(http::update_details)
                .delete(http::delete_details),
        )
        .route("/api/items/{id}/details/approval", post(http::approve_details))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Itemdesk server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
