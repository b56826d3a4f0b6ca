//! Error handling for the Vineyard Management Platform
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{GuardViolation, InvalidField, ViolationKind};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    // Consistency errors
    #[error("Prerequisite not met: {message}")]
    Prerequisite { message: String, message_es: String },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Storage operation timed out")]
    StorageTimeout,

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Construct a conflict error for `resource`
    pub fn conflict(resource: &str, message: impl Into<String>, message_es: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.into(),
            message_es: message_es.into(),
        }
    }

    /// Construct a validation error for `field`
    pub fn validation(field: &str, message: impl Into<String>, message_es: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_es: message_es.into(),
        }
    }

    /// HTTP status this error renders as
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::AccountDisabled | AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::Prerequisite { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_)
            | AppError::StorageTimeout
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InvalidField> for AppError {
    fn from(invalid: InvalidField) -> Self {
        AppError::validation(invalid.field, invalid.message, invalid.message_es)
    }
}

impl From<GuardViolation> for AppError {
    fn from(violation: GuardViolation) -> Self {
        match violation.kind() {
            ViolationKind::Prerequisite => AppError::Prerequisite {
                message: violation.to_string(),
                message_es: violation.message_es().to_string(),
            },
            ViolationKind::Conflict => {
                AppError::conflict("parcel", violation.to_string(), violation.message_es())
            }
        }
    }
}

/// Constraint names declared in the migrations
const ONE_ACTIVE_PER_PARCEL: &str = "plantings_one_active_per_parcel";
const PARCEL_NAME_UNIQUE: &str = "parcels_name_unique";
const GRAPE_TYPE_NAME_UNIQUE: &str = "grape_types_name_unique";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return AppError::StorageTimeout;
        }

        let (code, constraint) = match &err {
            sqlx::Error::Database(db) => (
                db.code().map(|c| c.into_owned()),
                db.constraint().map(str::to_owned),
            ),
            _ => (None, None),
        };

        match (code.as_deref(), constraint.as_deref()) {
            // query_canceled, raised by statement_timeout
            (Some("57014"), _) => AppError::StorageTimeout,
            (Some("23505"), Some(ONE_ACTIVE_PER_PARCEL)) => {
                GuardViolation::ActivePlantingExists.into()
            }
            (Some("23505"), Some(PARCEL_NAME_UNIQUE)) => AppError::validation(
                "name",
                "A parcel with this name already exists",
                "Ya existe una parcela con ese nombre",
            ),
            (Some("23505"), Some(GRAPE_TYPE_NAME_UNIQUE)) => AppError::validation(
                "name",
                "A grape type with this name already exists",
                "Ya existe un tipo de uva con ese nombre",
            ),
            _ => AppError::DatabaseError(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: format!("Invalid input: {}", errors),
            message_es: format!("Entrada inválida: {}", field),
            field,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: impl Into<String>, message_es: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_es: message_es.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_detail = match &self {
            AppError::InvalidCredentials => ErrorDetail::new(
                "INVALID_CREDENTIALS",
                "Invalid identifier or password",
                "Usuario o contraseña incorrectos",
            ),
            AppError::TokenExpired => {
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired", "El token ha expirado")
            }
            AppError::InvalidToken => {
                ErrorDetail::new("INVALID_TOKEN", "Invalid token", "Token inválido")
            }
            AppError::AccountDisabled => ErrorDetail::new(
                "ACCOUNT_DISABLED",
                "Account is disabled",
                "La cuenta está deshabilitada",
            ),
            AppError::InsufficientPermissions => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action",
                "Acceso denegado, rol insuficiente",
            ),
            AppError::Unauthorized { message, message_es } => {
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_es.clone())
            }
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_es.clone())
            },
            AppError::ValidationError(msg) => ErrorDetail::new(
                "VALIDATION_ERROR",
                msg.clone(),
                format!("Datos inválidos: {}", msg),
            ),
            AppError::Prerequisite { message, message_es } => {
                ErrorDetail::new("PREREQUISITE_FAILED", message.clone(), message_es.clone())
            }
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => ErrorDetail {
                field: Some(resource.clone()),
                ..ErrorDetail::new("CONFLICT", message.clone(), message_es.clone())
            },
            AppError::NotFound(resource) => ErrorDetail::new(
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("{} no encontrado", resource),
            ),
            AppError::DatabaseError(_) => ErrorDetail::new(
                "DATABASE_ERROR",
                "A database error occurred",
                "Ocurrió un error en la base de datos",
            ),
            AppError::StorageTimeout => ErrorDetail::new(
                "STORAGE_TIMEOUT",
                "The storage backend did not respond in time",
                "La base de datos no respondió a tiempo",
            ),
            AppError::Internal(msg) => ErrorDetail::new(
                "INTERNAL_ERROR",
                msg.clone(),
                "Error interno del servidor",
            ),
            AppError::InternalError(_) => ErrorDetail::new(
                "INTERNAL_ERROR",
                "An internal server error occurred",
                "Error interno del servidor",
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
