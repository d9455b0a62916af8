//! Itemdesk Server Binary
//!
//! Standalone server for the item records API.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use itemdesk_server::config::ServerConfig;
use itemdesk_server::{serve, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::load()?;
    let state = Arc::new(AppState::from_config(&config)?);

    serve(&config.addr, state).await
}
