//! Parcel models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::GeoPoint;

/// A tracked land unit under cultivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: Uuid,
    pub name: String,
    pub location_description: String,
    pub coordinates: GeoPoint,
    pub status: ParcelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parcel status, mirrored by the `parcel_statuses` reference table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    #[default]
    Available,
    InUse,
    Retired,
}

impl ParcelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Available => "available",
            ParcelStatus::InUse => "in_use",
            ParcelStatus::Retired => "retired",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "available" => Some(ParcelStatus::Available),
            "in_use" => Some(ParcelStatus::InUse),
            "retired" => Some(ParcelStatus::Retired),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
