//! Grape-type catalog HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use shared::{allow_lists, GrapeType};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::grape_type::{
    CreateGrapeTypeInput, GrapeTypeService, GrapeTypeView, UpdateGrapeTypeInput,
};
use crate::AppState;

/// List grape types with the parcels they are planted in
pub async fn list_grape_types(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = GrapeTypeService::new(state.storage.clone());
    let grape_types = service.list_grape_types().await?;
    Ok(Json(json!({ "grape_types": grape_types })))
}

/// Define a grape type and attach it to parcels' active plantings
pub async fn create_grape_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateGrapeTypeInput>, JsonRejection>,
) -> Result<(StatusCode, Json<GrapeTypeView>), AppError> {
    user.require_any(allow_lists::GRAPE_TYPE_WRITE)?;
    let Json(input) = body?;

    let service = GrapeTypeService::new(state.storage.clone());
    let view = service.create_grape_type(input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get a grape type
pub async fn get_grape_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(grape_type_id): Path<Uuid>,
) -> Result<Json<GrapeTypeView>, AppError> {
    user.require_any(allow_lists::READ)?;

    let service = GrapeTypeService::new(state.storage.clone());
    Ok(Json(service.get_grape_type(grape_type_id).await?))
}

/// Update a grape type
pub async fn update_grape_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(grape_type_id): Path<Uuid>,
    body: Result<Json<UpdateGrapeTypeInput>, JsonRejection>,
) -> Result<Json<GrapeType>, AppError> {
    user.require_any(allow_lists::GRAPE_TYPE_WRITE)?;
    let Json(input) = body?;

    let service = GrapeTypeService::new(state.storage.clone());
    Ok(Json(service.update_grape_type(grape_type_id, input).await?))
}
