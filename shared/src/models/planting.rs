//! Planting (cultivation cycle) models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a planting, mirrored by the `planting_states` table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlantingState {
    /// Currently growing; at most one per parcel
    #[default]
    Active,
    Inactive,
}

impl PlantingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantingState::Active => "active",
            PlantingState::Inactive => "inactive",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(PlantingState::Active),
            "inactive" => Some(PlantingState::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlantingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cultivation cycle on a parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planting {
    pub id: Uuid,
    pub parcel_id: Uuid,
    pub grape_type_id: Option<Uuid>,
    pub technique: String,
    pub planting_date: NaiveDate,
    pub plant_count: i32,
    pub observations: Option<String>,
    pub state: PlantingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Planting {
    pub fn is_active(&self) -> bool {
        self.state == PlantingState::Active
    }
}

/// Planting joined with the name of its grape type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantingView {
    #[serde(flatten)]
    pub planting: Planting,
    pub grape_type_name: Option<String>,
}
