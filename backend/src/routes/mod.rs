//! Route definitions for the Vineyard Management Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login public, the rest protected)
        .nest("/auth", auth_routes(state))
        // Protected routes - parcel registry and its ledgers
        .nest("/parcels", parcel_routes(state))
        // Protected routes - dimension overview
        .nest("/dimensions", dimension_routes(state))
        // Protected routes - planting lifecycle
        .nest("/plantings", planting_routes(state))
        // Protected routes - grape-type catalog
        .nest("/grape-types", grape_type_routes(state))
}

/// Authentication routes
fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/register", post(handlers::register))
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .merge(protected)
}

/// Parcel routes (protected)
fn parcel_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_parcels).post(handlers::create_parcel))
        .route(
            "/:parcel_id",
            get(handlers::get_parcel).put(handlers::update_parcel),
        )
        .route(
            "/:parcel_id/dimensions",
            get(handlers::get_dimensions).post(handlers::record_dimensions),
        )
        .route(
            "/:parcel_id/soil-controls",
            get(handlers::get_soil_controls).post(handlers::record_soil_control),
        )
        .route("/:parcel_id/plantings", get(handlers::get_parcel_plantings))
        .route(
            "/:parcel_id/plantings/active",
            get(handlers::get_active_planting),
        )
        .route(
            "/:parcel_id/plantings/active/grape-type",
            put(handlers::assign_parcel_grape_type),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Dimension overview routes (protected)
fn dimension_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_dimensions))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Planting routes (protected)
fn planting_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_plantings).post(handlers::create_planting),
        )
        .route(
            "/:planting_id",
            get(handlers::get_planting).put(handlers::update_planting),
        )
        .route("/:planting_id/state", put(handlers::set_planting_state))
        .route("/:planting_id/grape-type", put(handlers::assign_grape_type))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Grape-type routes (protected)
fn grape_type_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_grape_types).post(handlers::create_grape_type),
        )
        .route(
            "/:grape_type_id",
            get(handlers::get_grape_type).put(handlers::update_grape_type),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
