mod responses;
mod routes;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::concepts::{
    Authenticating, Badging, Blurring, Commenting, Friending, Liking, Posting, Reporting,
    Sessioning,
};
use crate::config::Config;
use crate::db::Database;

/// Shared application state: the composition of all concepts over one pool.
///
/// Concepts are instantiated here and synchronized together in
/// `routes.rs`; none of them holds a reference to another.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub authing: Authenticating,
    pub posting: Posting,
    pub commenting: Commenting,
    pub liking: Liking,
    pub badging: Badging,
    pub reporting: Reporting,
    pub blurring: Blurring,
    pub friending: Friending,
    pub sessioning: Sessioning,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            config: Arc::new(config),
            authing: Authenticating::new(pool.clone()),
            posting: Posting::new(pool.clone()),
            commenting: Commenting::new(pool.clone()),
            liking: Liking::new(pool.clone()),
            badging: Badging::new(pool.clone()),
            reporting: Reporting::new(pool.clone()),
            blurring: Blurring::new(pool.clone()),
            friending: Friending::new(pool.clone()),
            sessioning: Sessioning::new(pool),
        }
    }
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn serve(config: Config, db: Database) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let state = AppState::new(config, &db);
    let app = create_app(state);

    info!(addr = %addr, "Starting web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
#[must_use]
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
