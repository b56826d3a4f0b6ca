//! Dimension and soil-control ledger HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use shared::{allow_lists, DimensionRecord, Dimensions, LedgerView, SoilControlRecord, SoilReading};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::{DimensionService, SoilControlService};
use crate::AppState;

/// Record new dimensions for a parcel
pub async fn record_dimensions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
    body: Result<Json<Dimensions>, JsonRejection>,
) -> Result<(StatusCode, Json<DimensionRecord>), AppError> {
    user.require_any(allow_lists::DIMENSION_WRITE)?;
    let Json(input) = body?;

    let service = DimensionService::new(state.storage.clone());
    let record = service.record_dimensions(parcel_id, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Current dimensions and history of a parcel
pub async fn get_dimensions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
) -> Result<Json<LedgerView<DimensionRecord>>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = DimensionService::new(state.storage.clone());
    Ok(Json(service.get_current_and_history(parcel_id).await?))
}

/// Dimension ledgers of every measured parcel
pub async fn list_dimensions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = DimensionService::new(state.storage.clone());
    let parcels = service.list_overview().await?;
    Ok(Json(json!({ "parcels": parcels })))
}

/// Record a soil control for a parcel
pub async fn record_soil_control(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
    body: Result<Json<SoilReading>, JsonRejection>,
) -> Result<(StatusCode, Json<SoilControlRecord>), AppError> {
    user.require_any(allow_lists::SOIL_CONTROL_WRITE)?;
    let Json(input) = body?;

    let service = SoilControlService::new(state.storage.clone());
    let record = service.record_control(parcel_id, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Current soil control and history of a parcel
pub async fn get_soil_controls(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
) -> Result<Json<LedgerView<SoilControlRecord>>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = SoilControlService::new(state.storage.clone());
    Ok(Json(service.get_current_and_history(parcel_id).await?))
}
