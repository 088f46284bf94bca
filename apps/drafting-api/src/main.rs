//! Drafting API Server - HTTP front end for template drafting
//!
//! Provides REST endpoints for:
//! - Template creation, listing and lookup
//! - Resolving a drafting request to a template
//! - Question/answer draft sessions

use anyhow::Result;
use drafting_core::DraftingConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod error;
mod handlers;
mod models;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drafting_api=info".parse()?)
                .add_directive("drafting_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Initialize application state
    info!("Initializing Drafting API...");
    let config = DraftingConfig::from_env()?;
    let state = Arc::new(AppState::new(&config).await?);

    let app = routes::router(state);

    // Parse bind address
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting Drafting API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
