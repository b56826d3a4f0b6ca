//! Business logic services for the Vineyard Management Platform

pub mod auth;
pub mod dimension;
pub mod grape_type;
pub mod parcel;
pub mod planting;
pub mod soil_control;

pub use auth::AuthService;
pub use dimension::DimensionService;
pub use grape_type::GrapeTypeService;
pub use parcel::ParcelService;
pub use planting::PlantingService;
pub use soil_control::SoilControlService;

use shared::{evaluate, GuardAction, ParcelSnapshot};
use uuid::Uuid;

use crate::error::AppResult;

/// Run the consistency guard, logging denials
pub(crate) fn check_guard(
    parcel_id: Uuid,
    snapshot: &ParcelSnapshot,
    action: GuardAction,
) -> AppResult<()> {
    evaluate(snapshot, action).map_err(|violation| {
        tracing::warn!(
            parcel_id = %parcel_id,
            action = ?action,
            "Guard denied action: {}",
            violation
        );
        violation.into()
    })
}
