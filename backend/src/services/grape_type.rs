//! Grape-type catalog service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::planting::attach_to_active_planting;
use crate::error::{AppError, AppResult};
use crate::storage::{self, DynStorage, NewGrapeType, ParcelRef, StorageTx};
use shared::{validate_grape_requirements, validate_name, GrapeRequirements, GrapeType, RequirementRange};

/// Grape-type service for the cultivar catalog
#[derive(Clone)]
pub struct GrapeTypeService {
    storage: DynStorage,
}

/// Input for defining a cultivar and planting it on parcels
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGrapeTypeInput {
    pub name: String,
    pub description: Option<String>,
    pub ph: RequirementRange,
    pub humidity: RequirementRange,
    pub temperature: RequirementRange,
    pub harvest_duration_days: i32,
    /// Parcels whose active planting receives this grape type
    #[serde(default)]
    pub parcel_ids: Vec<Uuid>,
}

/// Input for updating a cultivar; absent fields keep their value
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateGrapeTypeInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ph: Option<RequirementRange>,
    pub humidity: Option<RequirementRange>,
    pub temperature: Option<RequirementRange>,
    pub harvest_duration_days: Option<i32>,
}

/// Cultivar with the parcels it is planted in
#[derive(Debug, Clone, Serialize)]
pub struct GrapeTypeView {
    #[serde(flatten)]
    pub grape_type: GrapeType,
    pub parcels: Vec<ParcelRef>,
}

impl GrapeTypeService {
    /// Create a new GrapeTypeService instance
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Define a grape type and attach it to the active planting of every
    /// listed parcel. Either every parcel accepts it or nothing is written,
    /// the catalog row included.
    pub async fn create_grape_type(&self, input: CreateGrapeTypeInput) -> AppResult<GrapeTypeView> {
        validate_name("name", &input.name)?;
        let requirements = GrapeRequirements {
            ph: input.ph,
            humidity: input.humidity,
            temperature: input.temperature,
            harvest_duration_days: input.harvest_duration_days,
        };
        validate_grape_requirements(&requirements)?;

        let new_grape_type = NewGrapeType {
            name: input.name.trim().to_string(),
            description: input.description,
            requirements,
        };

        // Parcels are locked in id order so overlapping requests cannot
        // deadlock each other
        let mut parcel_ids = input.parcel_ids;
        parcel_ids.sort_unstable();
        parcel_ids.dedup();

        let mut tx = self.storage.begin().await?;
        let result = Self::insert_and_attach(&mut *tx, &new_grape_type, &parcel_ids).await;
        let view = storage::finish(tx, result).await?;

        tracing::info!(
            grape_type_id = %view.grape_type.id,
            name = %view.grape_type.name,
            parcels = view.parcels.len(),
            "Grape type created"
        );

        Ok(view)
    }

    async fn insert_and_attach(
        tx: &mut dyn StorageTx,
        new_grape_type: &NewGrapeType,
        parcel_ids: &[Uuid],
    ) -> AppResult<GrapeTypeView> {
        if tx.grape_type_name_taken(&new_grape_type.name, None).await? {
            return Err(duplicate_name());
        }

        let grape_type = tx.insert_grape_type(new_grape_type).await?;

        let mut parcels = Vec::with_capacity(parcel_ids.len());
        for &parcel_id in parcel_ids {
            attach_to_active_planting(tx, parcel_id, grape_type.id).await?;
            let parcel = tx
                .fetch_parcel(parcel_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Parcel".to_string()))?;
            parcels.push(ParcelRef {
                id: parcel.id,
                name: parcel.name,
            });
        }

        Ok(GrapeTypeView {
            grape_type,
            parcels,
        })
    }

    /// Update a grape type's name, description or requirements
    pub async fn update_grape_type(
        &self,
        id: Uuid,
        input: UpdateGrapeTypeInput,
    ) -> AppResult<GrapeType> {
        if let Some(name) = &input.name {
            validate_name("name", name)?;
        }

        let mut tx = self.storage.begin().await?;
        let result = Self::apply_update(&mut *tx, id, input).await;
        let grape_type = storage::finish(tx, result).await?;

        tracing::info!(grape_type_id = %grape_type.id, "Grape type updated");

        Ok(grape_type)
    }

    async fn apply_update(
        tx: &mut dyn StorageTx,
        id: Uuid,
        input: UpdateGrapeTypeInput,
    ) -> AppResult<GrapeType> {
        let mut grape_type = tx
            .lock_grape_type(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Grape type".to_string()))?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if tx.grape_type_name_taken(&name, Some(id)).await? {
                return Err(duplicate_name());
            }
            grape_type.name = name;
        }
        if let Some(description) = input.description {
            grape_type.description = Some(description);
        }

        let requirements = &mut grape_type.requirements;
        if let Some(ph) = input.ph {
            requirements.ph = ph;
        }
        if let Some(humidity) = input.humidity {
            requirements.humidity = humidity;
        }
        if let Some(temperature) = input.temperature {
            requirements.temperature = temperature;
        }
        if let Some(days) = input.harvest_duration_days {
            requirements.harvest_duration_days = days;
        }
        validate_grape_requirements(requirements)?;

        tx.update_grape_type(&grape_type).await
    }

    /// A grape type with the parcels it is planted in
    pub async fn get_grape_type(&self, id: Uuid) -> AppResult<GrapeTypeView> {
        let grape_type = self
            .storage
            .get_grape_type(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Grape type".to_string()))?;

        let parcels = self
            .storage
            .grape_type_parcels()
            .await?
            .into_iter()
            .filter(|(grape_type_id, _)| *grape_type_id == id)
            .map(|(_, parcel)| parcel)
            .collect();

        Ok(GrapeTypeView {
            grape_type,
            parcels,
        })
    }

    /// Every grape type with the parcels it is planted in, by name
    pub async fn list_grape_types(&self) -> AppResult<Vec<GrapeTypeView>> {
        let grape_types = self.storage.list_grape_types().await?;

        let mut parcels: HashMap<Uuid, Vec<ParcelRef>> = HashMap::new();
        for (grape_type_id, parcel) in self.storage.grape_type_parcels().await? {
            parcels.entry(grape_type_id).or_default().push(parcel);
        }

        Ok(grape_types
            .into_iter()
            .map(|grape_type| {
                let parcels = parcels.remove(&grape_type.id).unwrap_or_default();
                GrapeTypeView {
                    grape_type,
                    parcels,
                }
            })
            .collect())
    }
}

fn duplicate_name() -> AppError {
    AppError::validation(
        "name",
        "A grape type with this name already exists",
        "Ya existe un tipo de uva con ese nombre",
    )
}
