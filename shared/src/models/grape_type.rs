//! Grape type (cultivar) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RequirementRange;

/// A cultivar definition with its agronomic requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrapeType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub requirements: GrapeRequirements,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Growing conditions a cultivar needs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GrapeRequirements {
    pub ph: RequirementRange,
    pub humidity: RequirementRange,
    pub temperature: RequirementRange,
    /// Days from planting to harvest
    pub harvest_duration_days: i32,
}
