//! Parcel registry HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::allow_lists;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::parcel::{CreateParcelInput, ParcelService, UpdateParcelInput};
use crate::AppState;

/// List all parcels with their current state
pub async fn list_parcels(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    if let Err(e) = user.require_any(allow_lists::READ) {
        return e.into_response();
    }
    let service = ParcelService::new(state.storage.clone());

    match service.list_parcels().await {
        Ok(parcels) => {
            (StatusCode::OK, Json(serde_json::json!({ "parcels": parcels }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Get a specific parcel
pub async fn get_parcel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = user.require_any(allow_lists::READ) {
        return e.into_response();
    }
    let service = ParcelService::new(state.storage.clone());

    match service.get_parcel(parcel_id).await {
        Ok(parcel) => (StatusCode::OK, Json(parcel)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a new parcel
pub async fn create_parcel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateParcelInput>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(e) = user.require_any(allow_lists::PARCEL_WRITE) {
        return e.into_response();
    }
    let Json(input) = match body {
        Ok(body) => body,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };
    let service = ParcelService::new(state.storage.clone());

    match service.create_parcel(input).await {
        Ok(parcel) => (StatusCode::CREATED, Json(parcel)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Update a parcel
pub async fn update_parcel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
    body: Result<Json<UpdateParcelInput>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(e) = user.require_any(allow_lists::PARCEL_WRITE) {
        return e.into_response();
    }
    let Json(input) = match body {
        Ok(body) => body,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };
    let service = ParcelService::new(state.storage.clone());

    match service.update_parcel(parcel_id, input).await {
        Ok(parcel) => (StatusCode::OK, Json(parcel)).into_response(),
        Err(e) => e.into_response(),
    }
}
