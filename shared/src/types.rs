//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Geographic position of a parcel (WGS84 degrees)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub longitude: Decimal,
    pub latitude: Decimal,
}

impl GeoPoint {
    pub fn new(longitude: Decimal, latitude: Decimal) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Inclusive min/max range used for agronomic requirements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RequirementRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl RequirementRange {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    /// Whether `value` falls inside the range (bounds included)
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Current record plus full history of an append-only ledger, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerView<T> {
    pub current: Option<T>,
    pub history: Vec<T>,
}

impl<T: Clone> LedgerView<T> {
    /// Build a view from records already ordered newest first
    pub fn from_history(history: Vec<T>) -> Self {
        Self {
            current: history.first().cloned(),
            history,
        }
    }
}

impl<T> Default for LedgerView<T> {
    fn default() -> Self {
        Self {
            current: None,
            history: Vec::new(),
        }
    }
}
