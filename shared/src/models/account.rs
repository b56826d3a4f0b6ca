//! Account and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role identifiers, seeded in the `roles` table
pub mod role_ids {
    pub const ADMIN: i32 = 1;
    pub const AGRONOMIST: i32 = 2;
    pub const FIELD_MANAGER: i32 = 3;
    pub const PLANTING_OPERATOR: i32 = 4;
    pub const AUDITOR: i32 = 5;

    pub const ALL: &[i32] = &[ADMIN, AGRONOMIST, FIELD_MANAGER, PLANTING_OPERATOR, AUDITOR];
}

/// Static per-route role allow-lists
pub mod allow_lists {
    use super::role_ids::*;

    pub const READ: &[i32] = ALL;
    pub const PARCEL_WRITE: &[i32] = &[ADMIN, FIELD_MANAGER];
    pub const DIMENSION_WRITE: &[i32] = &[ADMIN, FIELD_MANAGER];
    pub const SOIL_CONTROL_WRITE: &[i32] = &[ADMIN, AGRONOMIST, FIELD_MANAGER];
    pub const PLANTING_WRITE: &[i32] = &[ADMIN, AGRONOMIST, FIELD_MANAGER, PLANTING_OPERATOR];
    pub const GRAPE_TYPE_WRITE: &[i32] = &[ADMIN, AGRONOMIST];
    pub const USER_ADMIN: &[i32] = &[ADMIN];
}

/// A user account, without credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub identifier: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enabled: bool,
    pub roles: Vec<i32>,
    pub created_at: DateTime<Utc>,
}

/// Whether any of `held` appears in `allowed`
pub fn roles_permit(held: &[i32], allowed: &[i32]) -> bool {
    held.iter().any(|role| allowed.contains(role))
}
