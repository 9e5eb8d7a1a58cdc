//! Flywatch server - flight weather tracking and push check backend.

use anyhow::Result;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flywatch_server::api;
use flywatch_server::config::Config;
use flywatch_server::persistence;
use flywatch_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flywatch_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting flywatch server...");

    // Missing credentials are fatal: nothing runs without them.
    let config = Config::from_env()?;
    let port = config.server_port;

    let db = persistence::init_database(&config.database_path, 5).await?;
    let state = Arc::new(AppState::new(db, config.clone()));

    let app = api::routes(&config)
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
