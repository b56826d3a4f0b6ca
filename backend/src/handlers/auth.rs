//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::allow_lists;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthResponse, LoginInput, RegisterInput};
use crate::services::AuthService;
use crate::AppState;

#[derive(Serialize)]
pub struct MeResponse {
    pub identifier: String,
    pub roles: Vec<i32>,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(body) = body?;
    let auth_service = AuthService::new(state.storage.clone(), &state.config.jwt);
    let response = auth_service.login(body).await?;
    Ok(Json(response))
}

/// Register account endpoint handler (administrators only)
pub async fn register(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    user.require_any(allow_lists::USER_ADMIN)?;
    let Json(body) = body?;

    let auth_service = AuthService::new(state.storage.clone(), &state.config.jwt);
    let response = auth_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Identity carried by the caller's token
pub async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        identifier: user.identifier,
        roles: user.roles,
    })
}
