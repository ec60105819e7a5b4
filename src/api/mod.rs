//! HTTP API consumed by the ground station dashboard
//!
//! ## Endpoints
//!
//! - `GET /api/telemetry` - Current snapshot (never cached)
//! - `GET /api/health` - Liveness probe
//! - `GET /api/users` - User list without passwords
//! - `POST /api/users` - Add a user (admin credentials in the body)
//! - `POST /api/users/delete` - Remove a user (admin credentials in the body)
//! - `POST /api/auth` - Check a login
//!
//! Handlers only copy the snapshot out of the store, so a request never waits
//! for an ingestion cycle's file I/O.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    http::header,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:5050")
    pub bind_addr: SocketAddr,

    /// Allow any origin, for dashboards hosted elsewhere
    pub enable_cors: bool,

    /// Static dashboard files served for every non-API path
    pub dashboard_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiSettings::default().into()
    }
}

impl From<ApiSettings> for ApiConfig {
    fn from(settings: ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind_addr,
            enable_cors: settings.enable_cors,
            dashboard_dir: settings.dashboard_dir,
        }
    }
}

/// Build the router with all routes and layers
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    let api = Router::new()
        .route("/telemetry", get(routes::telemetry::get_telemetry))
        .route("/health", get(routes::health::health_check))
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::add_user),
        )
        .route("/users/delete", post(routes::users::delete_user))
        .route("/auth", post(routes::users::authenticate))
        .with_state(state);

    let mut app = Router::new().nest("/api", api);

    if let Some(dir) = &config.dashboard_dir {
        if dir.exists() {
            info!("serving dashboard from {}", dir.display());
            app = app.fallback_service(ServeDir::new(dir));
        } else {
            info!("dashboard directory {} not found", dir.display());
        }
    }

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([header::CONTENT_TYPE]);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
