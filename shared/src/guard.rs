//! Parcel consistency guard
//!
//! Stage ordering on a parcel is Dimensions → Soil control → Planting. The
//! guard is a pure decision over a [`ParcelSnapshot`] taken inside the write
//! transaction, so every mutating path shares one rule set.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current-state counts for one parcel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelSnapshot {
    pub dimension_count: i64,
    pub soil_control_count: i64,
    pub active_planting_count: i64,
    /// Whether the active planting (if any) already has a grape type
    pub active_planting_has_grape_type: bool,
}

/// A mutation proposed against a parcel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardAction {
    RecordDimensions,
    RecordSoilControl,
    CreatePlanting,
    /// Move an inactive planting back to active
    ActivatePlanting,
    AssignGrapeType,
}

/// How a violation should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Prerequisite,
    Conflict,
}

/// Why the guard denied an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("parcel has no dimensions on file")]
    MissingDimensions,

    #[error("parcel has no soil controls on file")]
    MissingSoilControl,

    #[error("parcel already has an active planting")]
    ActivePlantingExists,

    #[error("parcel has an active planting; dimensions cannot change")]
    DimensionsLocked,

    #[error("parcel has no active planting")]
    NoActivePlanting,

    #[error("active planting already has a grape type")]
    GrapeTypeAlreadyAssigned,
}

impl GuardViolation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            GuardViolation::MissingDimensions
            | GuardViolation::MissingSoilControl
            | GuardViolation::ActivePlantingExists
            | GuardViolation::DimensionsLocked => ViolationKind::Prerequisite,
            GuardViolation::NoActivePlanting
            | GuardViolation::GrapeTypeAlreadyAssigned => ViolationKind::Conflict,
        }
    }

    /// Spanish rendering for API error bodies
    pub fn message_es(&self) -> &'static str {
        match self {
            GuardViolation::MissingDimensions => "La parcela no tiene dimensiones asociadas",
            GuardViolation::MissingSoilControl => "La parcela no tiene controles de tierra",
            GuardViolation::ActivePlantingExists => "La parcela ya tiene una siembra activa",
            GuardViolation::DimensionsLocked => {
                "La parcela tiene una siembra activa; no se pueden cambiar sus dimensiones"
            }
            GuardViolation::NoActivePlanting => "La parcela no tiene una siembra activa",
            GuardViolation::GrapeTypeAlreadyAssigned => {
                "La siembra activa ya tiene un tipo de uva asignado"
            }
        }
    }
}

/// Decide whether `action` may proceed on a parcel in state `snapshot`
pub fn evaluate(snapshot: &ParcelSnapshot, action: GuardAction) -> Result<(), GuardViolation> {
    match action {
        GuardAction::RecordDimensions => {
            if snapshot.active_planting_count > 0 {
                return Err(GuardViolation::DimensionsLocked);
            }
        }
        GuardAction::RecordSoilControl => {
            if snapshot.dimension_count == 0 {
                return Err(GuardViolation::MissingDimensions);
            }
        }
        GuardAction::CreatePlanting => {
            if snapshot.dimension_count == 0 {
                return Err(GuardViolation::MissingDimensions);
            }
            if snapshot.active_planting_count > 0 {
                return Err(GuardViolation::ActivePlantingExists);
            }
            if snapshot.soil_control_count == 0 {
                return Err(GuardViolation::MissingSoilControl);
            }
        }
        GuardAction::ActivatePlanting => {
            if snapshot.active_planting_count > 0 {
                return Err(GuardViolation::ActivePlantingExists);
            }
        }
        GuardAction::AssignGrapeType => {
            if snapshot.active_planting_count == 0 {
                return Err(GuardViolation::NoActivePlanting);
            }
            if snapshot.active_planting_has_grape_type {
                return Err(GuardViolation::GrapeTypeAlreadyAssigned);
            }
        }
    }
    Ok(())
}
