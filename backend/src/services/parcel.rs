//! Parcel registry service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::check_guard;
use crate::error::{AppError, AppResult};
use crate::storage::{self, DynStorage, NewParcel, StorageTx};
use shared::{
    validate_coordinates, validate_dimensions, validate_name, validate_soil_reading,
    DimensionRecord, Dimensions, GeoPoint, GuardAction, Parcel, ParcelStatus, PlantingView,
    SoilControlRecord, SoilReading,
};

/// Parcel service for the registry and its composed views
#[derive(Clone)]
pub struct ParcelService {
    storage: DynStorage,
}

/// Input for creating a parcel, optionally with its first measurements
#[derive(Debug, Deserialize)]
pub struct CreateParcelInput {
    pub name: String,
    #[serde(default)]
    pub location_description: String,
    pub longitude: Decimal,
    pub latitude: Decimal,
    #[serde(default)]
    pub status: ParcelStatus,
    pub initial_dimensions: Option<Dimensions>,
    pub initial_soil_control: Option<SoilReading>,
}

/// Input for updating a parcel; absent fields keep their value
#[derive(Debug, Deserialize, Default)]
pub struct UpdateParcelInput {
    pub name: Option<String>,
    pub location_description: Option<String>,
    pub longitude: Option<Decimal>,
    pub latitude: Option<Decimal>,
    pub status: Option<ParcelStatus>,
}

/// Parcel with its current measurements and planting
#[derive(Debug, Clone, Serialize)]
pub struct ParcelView {
    #[serde(flatten)]
    pub parcel: Parcel,
    pub current_dimensions: Option<DimensionRecord>,
    pub current_soil_control: Option<SoilControlRecord>,
    /// The active planting, or the most recent one when none is active
    pub planting: Option<PlantingView>,
    /// Plants per square meter of the active planting
    pub plant_density: Option<Decimal>,
}

impl ParcelView {
    /// Compose a view from a parcel's latest records and its plantings,
    /// newest first
    pub fn compose(
        parcel: Parcel,
        current_dimensions: Option<DimensionRecord>,
        current_soil_control: Option<SoilControlRecord>,
        plantings: &[PlantingView],
    ) -> Self {
        let planting = plantings
            .iter()
            .find(|view| view.planting.is_active())
            .or_else(|| plantings.first())
            .cloned();

        let plant_density = match (&planting, &current_dimensions) {
            (Some(view), Some(record)) if view.planting.is_active() => {
                plant_density(view.planting.plant_count, record.dimensions.surface)
            }
            _ => None,
        };

        Self {
            parcel,
            current_dimensions,
            current_soil_control,
            planting,
            plant_density,
        }
    }
}

fn plant_density(plant_count: i32, surface: Decimal) -> Option<Decimal> {
    if surface <= Decimal::ZERO {
        return None;
    }
    Decimal::from(plant_count)
        .checked_div(surface)
        .map(|density| density.round_dp(4))
}

impl ParcelService {
    /// Create a new ParcelService instance
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Register a parcel, with optional initial dimensions and soil control
    /// written in the same transaction
    pub async fn create_parcel(&self, input: CreateParcelInput) -> AppResult<ParcelView> {
        validate_name("name", &input.name)?;
        let coordinates = GeoPoint::new(input.longitude, input.latitude);
        validate_coordinates(&coordinates)?;
        if let Some(dimensions) = &input.initial_dimensions {
            validate_dimensions(dimensions)?;
        }
        if let Some(reading) = &input.initial_soil_control {
            validate_soil_reading(reading)?;
        }

        let new_parcel = NewParcel {
            name: input.name.trim().to_string(),
            location_description: input.location_description.trim().to_string(),
            coordinates,
            status: input.status,
        };

        let mut tx = self.storage.begin().await?;
        let result = Self::insert_parcel(
            &mut *tx,
            &new_parcel,
            input.initial_dimensions.as_ref(),
            input.initial_soil_control.as_ref(),
        )
        .await;
        let view = storage::finish(tx, result).await?;

        tracing::info!(
            parcel_id = %view.parcel.id,
            name = %view.parcel.name,
            "Parcel created"
        );

        Ok(view)
    }

    async fn insert_parcel(
        tx: &mut dyn StorageTx,
        new_parcel: &NewParcel,
        dimensions: Option<&Dimensions>,
        reading: Option<&SoilReading>,
    ) -> AppResult<ParcelView> {
        if tx.parcel_name_taken(&new_parcel.name, None).await? {
            return Err(duplicate_name());
        }

        let parcel = tx.insert_parcel(new_parcel).await?;

        let mut current_dimensions = None;
        if let Some(dimensions) = dimensions {
            let snapshot = storage::require_parcel(tx, parcel.id).await?;
            check_guard(parcel.id, &snapshot, GuardAction::RecordDimensions)?;
            current_dimensions = Some(tx.insert_dimensions(parcel.id, dimensions).await?);
        }

        let mut current_soil_control = None;
        if let Some(reading) = reading {
            let snapshot = storage::require_parcel(tx, parcel.id).await?;
            check_guard(parcel.id, &snapshot, GuardAction::RecordSoilControl)?;
            current_soil_control = Some(tx.insert_soil_control(parcel.id, reading).await?);
        }

        Ok(ParcelView::compose(
            parcel,
            current_dimensions,
            current_soil_control,
            &[],
        ))
    }

    /// Partially update a parcel's identity, location or status
    pub async fn update_parcel(&self, id: Uuid, input: UpdateParcelInput) -> AppResult<ParcelView> {
        if let Some(name) = &input.name {
            validate_name("name", name)?;
        }

        let mut tx = self.storage.begin().await?;
        let result = Self::apply_update(&mut *tx, id, input).await;
        let parcel = storage::finish(tx, result).await?;

        tracing::info!(parcel_id = %parcel.id, "Parcel updated");

        self.get_parcel(parcel.id).await
    }

    async fn apply_update(
        tx: &mut dyn StorageTx,
        id: Uuid,
        input: UpdateParcelInput,
    ) -> AppResult<Parcel> {
        let mut parcel = tx
            .fetch_parcel(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parcel".to_string()))?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if tx.parcel_name_taken(&name, Some(id)).await? {
                return Err(duplicate_name());
            }
            parcel.name = name;
        }
        if let Some(location_description) = input.location_description {
            parcel.location_description = location_description.trim().to_string();
        }
        if let Some(longitude) = input.longitude {
            parcel.coordinates.longitude = longitude;
        }
        if let Some(latitude) = input.latitude {
            parcel.coordinates.latitude = latitude;
        }
        if let Some(status) = input.status {
            parcel.status = status;
        }

        validate_coordinates(&parcel.coordinates)?;

        tx.update_parcel(&parcel).await
    }

    /// Get a parcel with its current dimensions, soil control and planting
    pub async fn get_parcel(&self, id: Uuid) -> AppResult<ParcelView> {
        let parcel = self
            .storage
            .get_parcel(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parcel".to_string()))?;

        let dimensions = self.storage.dimension_history(id).await?;
        let soil_controls = self.storage.soil_control_history(id).await?;
        let plantings = self.storage.planting_history(id).await?;

        Ok(ParcelView::compose(
            parcel,
            dimensions.into_iter().next(),
            soil_controls.into_iter().next(),
            &plantings,
        ))
    }

    /// List every parcel with the same composition as [`Self::get_parcel`]
    pub async fn list_parcels(&self) -> AppResult<Vec<ParcelView>> {
        let parcels = self.storage.list_parcels().await?;

        let mut dimensions: HashMap<Uuid, DimensionRecord> = self
            .storage
            .latest_dimensions()
            .await?
            .into_iter()
            .map(|record| (record.parcel_id, record))
            .collect();

        let mut soil_controls: HashMap<Uuid, SoilControlRecord> = self
            .storage
            .latest_soil_controls()
            .await?
            .into_iter()
            .map(|record| (record.parcel_id, record))
            .collect();

        let mut plantings: HashMap<Uuid, Vec<PlantingView>> = HashMap::new();
        for view in self.storage.all_plantings().await? {
            plantings
                .entry(view.planting.parcel_id)
                .or_default()
                .push(view);
        }

        Ok(parcels
            .into_iter()
            .map(|parcel| {
                let id = parcel.id;
                ParcelView::compose(
                    parcel,
                    dimensions.remove(&id),
                    soil_controls.remove(&id),
                    plantings.get(&id).map(Vec::as_slice).unwrap_or_default(),
                )
            })
            .collect())
    }
}

fn duplicate_name() -> AppError {
    AppError::validation(
        "name",
        "A parcel with this name already exists",
        "Ya existe una parcela con ese nombre",
    )
}
