//! HTTP interface - JSON over axum.
//!
//! Handlers only extract the requester and the request payload, call into `core`, and
//! render the result. Errors become `{ "message", "error" }` bodies via [`AppError`].

pub mod auth;
pub mod error;
mod expenses;
pub mod extract;
mod invites;
mod notifications;
mod plans;
mod users;

use crate::{config::Settings, errors::Result};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;

pub use error::AppError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Immutable application settings
    pub settings: Arc<Settings>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the application router with every route mounted.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(users::routes())
        .merge(plans::routes())
        .merge(invites::routes())
        .merge(expenses::routes())
        .merge(notifications::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Serves the API until Ctrl-C.
pub async fn run_serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.bind, state.settings.server.port
    )
    .parse()
    .map_err(|e| crate::errors::Error::Config {
        message: format!("Invalid listen address: {e}"),
    })?;

    let app = build_router(state);
    tracing::info!("plan-buddy listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("plan-buddy shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
    }
}
