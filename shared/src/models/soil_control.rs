//! Soil control models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A soil-condition reading taken on a parcel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoilReading {
    pub ph: Decimal,
    /// Relative humidity percentage (0-100)
    pub humidity: Decimal,
    /// Temperature in degrees Celsius
    pub temperature: Decimal,
    pub observations: Option<String>,
}

/// A versioned soil-control record; never mutated once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilControlRecord {
    pub id: Uuid,
    pub parcel_id: Uuid,
    #[serde(flatten)]
    pub reading: SoilReading,
    pub created_at: DateTime<Utc>,
}
