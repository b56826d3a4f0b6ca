//! Planting lifecycle HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use shared::{allow_lists, Planting, PlantingView};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::planting::{
    AssignGrapeTypeInput, CreatePlantingInput, PlantingDetail, PlantingService,
    SetPlantingStateInput, UpdatePlantingInput,
};
use crate::AppState;

/// Plantings grouped by parcel
pub async fn list_plantings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = PlantingService::new(state.storage.clone());
    let parcels = service.list_overview().await?;
    Ok(Json(json!({ "parcels": parcels })))
}

/// Start a planting
pub async fn create_planting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreatePlantingInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Planting>), AppError> {
    user.require_any(allow_lists::PLANTING_WRITE)?;
    let Json(input) = body?;

    let service = PlantingService::new(state.storage.clone());
    let planting = service.create_planting(input).await?;
    Ok((StatusCode::CREATED, Json(planting)))
}

/// Get a planting with its parcel and latest soil control
pub async fn get_planting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(planting_id): Path<Uuid>,
) -> Result<Json<PlantingDetail>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = PlantingService::new(state.storage.clone());
    Ok(Json(service.get_planting(planting_id).await?))
}

/// Update a planting's descriptive fields
pub async fn update_planting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(planting_id): Path<Uuid>,
    body: Result<Json<UpdatePlantingInput>, JsonRejection>,
) -> Result<Json<Planting>, AppError> {
    user.require_any(allow_lists::PLANTING_WRITE)?;
    let Json(input) = body?;

    let service = PlantingService::new(state.storage.clone());
    Ok(Json(service.update_planting(planting_id, input).await?))
}

/// Transition a planting between active and inactive
pub async fn set_planting_state(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(planting_id): Path<Uuid>,
    body: Result<Json<SetPlantingStateInput>, JsonRejection>,
) -> Result<Json<Planting>, AppError> {
    user.require_any(allow_lists::PLANTING_WRITE)?;
    let Json(input) = body?;

    let service = PlantingService::new(state.storage.clone());
    Ok(Json(service.set_state(planting_id, input.state).await?))
}

/// Assign a grape type to a planting
pub async fn assign_grape_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(planting_id): Path<Uuid>,
    body: Result<Json<AssignGrapeTypeInput>, JsonRejection>,
) -> Result<Json<Planting>, AppError> {
    user.require_any(allow_lists::PLANTING_WRITE)?;
    let Json(input) = body?;

    let service = PlantingService::new(state.storage.clone());
    let planting = service
        .assign_grape_type(planting_id, input.grape_type_id)
        .await?;
    Ok(Json(planting))
}

/// Planting history of a parcel
pub async fn get_parcel_plantings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = PlantingService::new(state.storage.clone());
    let plantings = service.get_history(parcel_id).await?;
    Ok(Json(json!({ "plantings": plantings })))
}

/// Active planting of a parcel
pub async fn get_active_planting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
) -> Result<Json<PlantingView>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = PlantingService::new(state.storage.clone());
    Ok(Json(service.get_active_planting(parcel_id).await?))
}

/// Assign a grape type to the active planting of a parcel
pub async fn assign_parcel_grape_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(parcel_id): Path<Uuid>,
    body: Result<Json<AssignGrapeTypeInput>, JsonRejection>,
) -> Result<Json<Planting>, AppError> {
    user.require_any(allow_lists::PLANTING_WRITE)?;
    let Json(input) = body?;

    let service = PlantingService::new(state.storage.clone());
    let planting = service
        .assign_grape_type_to_parcel(parcel_id, input.grape_type_id)
        .await?;
    Ok(Json(planting))
}
