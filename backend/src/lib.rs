//! Vineyard Management Platform - Backend
//!
//! Role-gated REST backend for vineyard parcels, their dimension and
//! soil-control ledgers, the grape-type catalog, and planting lifecycles.

use axum::{routing::get, Router};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use storage::DynStorage;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: DynStorage,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(storage: DynStorage, config: Config) -> Self {
        Self {
            storage,
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(&state))
        .fallback(not_found)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Vineyard Management Platform API v1.0"
}

async fn not_found() -> AppError {
    AppError::NotFound("Route".to_string())
}
