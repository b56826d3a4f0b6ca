//! Authentication middleware
//!
//! Bearer token authentication and static role allow-lists

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::roles_permit;

use crate::error::{AppError, AppResult};
use crate::services::AuthService;
use crate::AppState;

/// Authenticated account information extracted from the token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub identifier: String,
    pub roles: Vec<i32>,
}

impl AuthUser {
    /// Check if the account holds any of the allowed roles
    pub fn has_any_role(&self, allowed: &[i32]) -> bool {
        roles_permit(&self.roles, allowed)
    }

    /// Fail with `InsufficientPermissions` unless a role is allowed
    pub fn require_any(&self, allowed: &[i32]) -> AppResult<()> {
        if self.has_any_role(allowed) {
            Ok(())
        } else {
            tracing::warn!(
                identifier = %self.identifier,
                roles = ?self.roles,
                allowed = ?allowed,
                "Role check failed"
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// Authentication middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token,
        None => {
            return AppError::Unauthorized {
                message: "Missing or invalid Authorization header".to_string(),
                message_es: "Token no proporcionado".to_string(),
            }
            .into_response();
        }
    };

    let service = AuthService::new(state.storage.clone(), &state.config.jwt);
    let claims = match service.verify_token(token) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        identifier: claims.sub,
        roles: claims.roles,
    });

    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor for the authenticated account
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_es: "Se requiere autenticación".to_string(),
            })
    }
}
