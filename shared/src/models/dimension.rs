//! Parcel dimension models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Physical measurements of a parcel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    /// Surface in square meters
    pub surface: Decimal,
    /// Length in meters
    pub length: Decimal,
    /// Width in meters
    pub width: Decimal,
    /// Slope as a percentage (0-100)
    pub slope: Decimal,
}

/// A versioned dimension snapshot; never mutated once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub id: Uuid,
    pub parcel_id: Uuid,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    pub created_at: DateTime<Utc>,
}
