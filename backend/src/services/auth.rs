//! Authentication service for account registration, login, and token management

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{BootstrapConfig, JwtConfig};
use crate::error::{AppError, AppResult};
use crate::storage::{self, DynStorage, NewAccount, StorageTx};
use shared::{role_ids, validate_password, Account};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    storage: DynStorage,
    jwt_secret: String,
    access_token_expiry: i64,
    hash_cost: u32,
}

/// Credentials submitted to the login endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 64))]
    pub identifier: String,
    #[validate(length(min = 1))]
    pub secret: String,
}

/// Input for registering a new account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 64))]
    pub identifier: String,
    pub secret: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub roles: Vec<i32>,
}

/// Response after a successful login or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub identifier: String,
    pub roles: Vec<i32>,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier
    pub sub: String,
    pub roles: Vec<i32>,
    pub iat: i64,
    pub exp: i64,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(storage: DynStorage, jwt: &JwtConfig) -> Self {
        Self {
            storage,
            jwt_secret: jwt.secret.clone(),
            access_token_expiry: jwt.access_token_expiry,
            hash_cost: jwt.hash_cost,
        }
    }

    /// Authenticate an account with identifier and secret
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        input.validate()?;
        let identifier = input.identifier.trim();

        let credentials = self
            .storage
            .find_account(identifier)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(&input.secret, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::warn!(identifier = %identifier, "Login rejected: wrong secret");
            return Err(AppError::InvalidCredentials);
        }

        if !credentials.account.enabled {
            return Err(AppError::AccountDisabled);
        }

        let account = credentials.account;
        let token = self.issue_token(&account.identifier, &account.roles)?;

        tracing::info!(identifier = %account.identifier, "Account logged in");

        Ok(AuthResponse {
            token,
            identifier: account.identifier,
            roles: account.roles,
        })
    }

    /// Register a new account and issue its first token
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse> {
        let account = self.create_account(input).await?;
        let token = self.issue_token(&account.identifier, &account.roles)?;

        Ok(AuthResponse {
            token,
            identifier: account.identifier,
            roles: account.roles,
        })
    }

    /// Seed the configured administrator when it does not exist yet
    pub async fn bootstrap_admin(&self, bootstrap: &BootstrapConfig) -> AppResult<Option<Account>> {
        let (Some(identifier), Some(secret)) = (&bootstrap.admin_identifier, &bootstrap.admin_secret)
        else {
            return Ok(None);
        };

        if self.storage.find_account(identifier).await?.is_some() {
            tracing::debug!(identifier = %identifier, "Administrator already present");
            return Ok(None);
        }

        let email = bootstrap
            .admin_email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost.localdomain", identifier));

        let account = self
            .create_account(RegisterInput {
                identifier: identifier.clone(),
                secret: secret.clone(),
                first_name: "Administrator".to_string(),
                last_name: "Vineyard".to_string(),
                email,
                roles: vec![role_ids::ADMIN],
            })
            .await?;

        Ok(Some(account))
    }

    /// Issue an access token for an identifier and role set
    pub fn issue_token(&self, identifier: &str, roles: &[i32]) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identifier.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token and return its claims
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })
    }

    async fn create_account(&self, input: RegisterInput) -> AppResult<Account> {
        input.validate()?;
        validate_password(&input.secret)?;

        let password_hash = hash(&input.secret, self.hash_cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut roles = input.roles.clone();
        roles.sort_unstable();
        roles.dedup();

        let new_account = NewAccount {
            identifier: input.identifier.trim().to_string(),
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            roles,
        };

        let mut tx = self.storage.begin().await?;
        let result = Self::insert_account(&mut *tx, &new_account).await;
        let account = storage::finish(tx, result).await?;

        tracing::info!(
            identifier = %account.identifier,
            roles = ?account.roles,
            "Account registered"
        );

        Ok(account)
    }

    async fn insert_account(tx: &mut dyn StorageTx, account: &NewAccount) -> AppResult<Account> {
        if tx.account_exists(&account.identifier, &account.email).await? {
            return Err(AppError::validation(
                "identifier",
                "An account with this identifier or email already exists",
                "El usuario o correo ya existe",
            ));
        }

        let unknown = tx.unknown_roles(&account.roles).await?;
        if !unknown.is_empty() {
            return Err(AppError::validation(
                "roles",
                format!("Unknown roles: {:?}", unknown),
                format!("Roles inválidos: {:?}", unknown),
            ));
        }

        tx.insert_account(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryStorage::new()),
            &JwtConfig::for_testing("test-secret"),
        )
    }

    #[test]
    fn test_token_roundtrip_keeps_roles() {
        let service = service();
        let token = service.issue_token("ana", &[2, 3]).unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "ana");
        assert_eq!(claims.roles, vec![2, 3]);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(
            Arc::new(MemoryStorage::new()),
            &JwtConfig::for_testing("another-secret"),
        );
        let token = other.issue_token("ana", &[1]).unwrap();
        assert!(matches!(
            service().verify_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_reported() {
        let mut jwt = JwtConfig::for_testing("test-secret");
        jwt.access_token_expiry = -120;
        let service = AuthService::new(Arc::new(MemoryStorage::new()), &jwt);
        let token = service.issue_token("ana", &[1]).unwrap();
        assert!(matches!(
            service.verify_token(&token),
            Err(AppError::TokenExpired)
        ));
    }
}
