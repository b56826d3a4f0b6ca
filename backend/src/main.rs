//! Vineyard Management Platform - Backend Server
//!
//! Tracks vineyard parcels, their measurements and soil readings, grape
//! varieties, and the planting lifecycle behind role-gated REST routes.

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vineyard_backend::{
    create_app,
    services::AuthService,
    storage::{DynStorage, PgStorage},
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "vineyard_server=debug,vineyard_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    let json_logs = std::env::var("VINEYARD_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Vineyard Management Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let pg = PgStorage::connect(&config.database).await?;
    tracing::info!("Database connection established");

    // Run migrations in development
    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(pg.pool()).await?;
        tracing::info!("Migrations completed");
    }

    let storage: DynStorage = Arc::new(pg);

    // Seed the administrator account
    let auth_service = AuthService::new(storage.clone(), &config.jwt);
    if let Some(admin) = auth_service.bootstrap_admin(&config.bootstrap).await? {
        tracing::info!(identifier = %admin.identifier, "Administrator account created");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Build application
    let app = create_app(AppState::new(storage, config));

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
