//! Planting lifecycle service
//!
//! A planting is created `active` and at most one planting per parcel is
//! active at a time. Every write locks the parcel first, before any grape
//! type is read, and consults the consistency guard before touching the
//! planting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::check_guard;
use crate::error::{AppError, AppResult};
use crate::storage::{self, DynStorage, NewPlanting, ParcelRef, StorageTx};
use shared::{
    validate_plant_count, validate_technique, GuardAction, GuardViolation, ParcelSnapshot,
    Planting, PlantingState, PlantingView, SoilControlRecord,
};

/// Planting service for cultivation cycles
#[derive(Clone)]
pub struct PlantingService {
    storage: DynStorage,
}

/// Input for starting a planting on a parcel
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlantingInput {
    pub parcel_id: Uuid,
    pub grape_type_id: Option<Uuid>,
    pub planting_date: NaiveDate,
    pub plant_count: i32,
    pub technique: String,
    pub observations: Option<String>,
}

/// Input for correcting a planting's descriptive fields
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdatePlantingInput {
    pub planting_date: Option<NaiveDate>,
    pub plant_count: Option<i32>,
    pub technique: Option<String>,
    pub observations: Option<String>,
}

/// Input for a state transition
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetPlantingStateInput {
    pub state: PlantingState,
}

/// Input for attaching a grape type
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AssignGrapeTypeInput {
    pub grape_type_id: Uuid,
}

/// Planting with its parcel and latest soil reading
#[derive(Debug, Clone, Serialize)]
pub struct PlantingDetail {
    #[serde(flatten)]
    pub view: PlantingView,
    pub parcel_name: String,
    pub latest_soil_control: Option<SoilControlRecord>,
}

/// Plantings of one parcel in the overview
#[derive(Debug, Clone, Serialize)]
pub struct ParcelPlantings {
    pub parcel: ParcelRef,
    pub current: Option<PlantingView>,
    pub history: Vec<PlantingView>,
}

impl PlantingService {
    /// Create a new PlantingService instance
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Start a planting. Prerequisites are checked in order: dimensions on
    /// file, no active planting, soil controls on file.
    pub async fn create_planting(&self, input: CreatePlantingInput) -> AppResult<Planting> {
        validate_plant_count(input.plant_count)?;
        validate_technique(&input.technique)?;

        let new_planting = NewPlanting {
            parcel_id: input.parcel_id,
            grape_type_id: input.grape_type_id,
            technique: input.technique.trim().to_string(),
            planting_date: input.planting_date,
            plant_count: input.plant_count,
            observations: input.observations,
        };

        let mut tx = self.storage.begin().await?;
        let result = Self::insert_planting(&mut *tx, &new_planting).await;
        let planting = storage::finish(tx, result).await?;

        tracing::info!(
            planting_id = %planting.id,
            parcel_id = %planting.parcel_id,
            plant_count = planting.plant_count,
            "Planting created"
        );

        Ok(planting)
    }

    async fn insert_planting(tx: &mut dyn StorageTx, planting: &NewPlanting) -> AppResult<Planting> {
        let snapshot = storage::require_parcel(tx, planting.parcel_id).await?;

        if let Some(grape_type_id) = planting.grape_type_id {
            if tx.fetch_grape_type(grape_type_id).await?.is_none() {
                return Err(AppError::NotFound("Grape type".to_string()));
            }
        }

        check_guard(planting.parcel_id, &snapshot, GuardAction::CreatePlanting)?;
        tx.insert_planting(planting).await
    }

    /// Correct count, technique, observations or date; state is untouched
    pub async fn update_planting(
        &self,
        id: Uuid,
        input: UpdatePlantingInput,
    ) -> AppResult<Planting> {
        if let Some(plant_count) = input.plant_count {
            validate_plant_count(plant_count)?;
        }
        if let Some(technique) = &input.technique {
            validate_technique(technique)?;
        }

        let mut tx = self.storage.begin().await?;
        let result = Self::apply_update(&mut *tx, id, input).await;
        let planting = storage::finish(tx, result).await?;

        tracing::info!(planting_id = %planting.id, "Planting updated");

        Ok(planting)
    }

    async fn apply_update(
        tx: &mut dyn StorageTx,
        id: Uuid,
        input: UpdatePlantingInput,
    ) -> AppResult<Planting> {
        let (mut planting, _) = lock_planting(tx, id).await?;

        if let Some(planting_date) = input.planting_date {
            planting.planting_date = planting_date;
        }
        if let Some(plant_count) = input.plant_count {
            planting.plant_count = plant_count;
        }
        if let Some(technique) = input.technique {
            planting.technique = technique.trim().to_string();
        }
        if let Some(observations) = input.observations {
            planting.observations = Some(observations);
        }

        tx.update_planting(&planting).await
    }

    /// Move a planting between `active` and `inactive`
    pub async fn set_state(&self, id: Uuid, state: PlantingState) -> AppResult<Planting> {
        let mut tx = self.storage.begin().await?;
        let result = Self::transition(&mut *tx, id, state).await;
        let planting = storage::finish(tx, result).await?;

        tracing::info!(
            planting_id = %planting.id,
            parcel_id = %planting.parcel_id,
            state = %planting.state,
            "Planting state set"
        );

        Ok(planting)
    }

    async fn transition(
        tx: &mut dyn StorageTx,
        id: Uuid,
        state: PlantingState,
    ) -> AppResult<Planting> {
        let (mut planting, snapshot) = lock_planting(tx, id).await?;

        if planting.state == state {
            return Ok(planting);
        }
        if state == PlantingState::Active {
            check_guard(planting.parcel_id, &snapshot, GuardAction::ActivatePlanting)?;
        }

        planting.state = state;
        tx.update_planting(&planting).await
    }

    /// Attach a grape type to a planting that is active and unassigned
    pub async fn assign_grape_type(
        &self,
        planting_id: Uuid,
        grape_type_id: Uuid,
    ) -> AppResult<Planting> {
        let mut tx = self.storage.begin().await?;
        let result = Self::assign(&mut *tx, planting_id, grape_type_id).await;
        let planting = storage::finish(tx, result).await?;

        tracing::info!(
            planting_id = %planting.id,
            grape_type_id = %grape_type_id,
            "Grape type assigned"
        );

        Ok(planting)
    }

    async fn assign(
        tx: &mut dyn StorageTx,
        planting_id: Uuid,
        grape_type_id: Uuid,
    ) -> AppResult<Planting> {
        let (mut planting, snapshot) = lock_planting(tx, planting_id).await?;

        if tx.fetch_grape_type(grape_type_id).await?.is_none() {
            return Err(AppError::NotFound("Grape type".to_string()));
        }
        if !planting.is_active() {
            return Err(AppError::conflict(
                "planting",
                "Only an active planting can receive a grape type",
                "Solo una siembra activa puede recibir un tipo de uva",
            ));
        }
        check_guard(planting.parcel_id, &snapshot, GuardAction::AssignGrapeType)?;

        planting.grape_type_id = Some(grape_type_id);
        tx.update_planting(&planting).await
    }

    /// Attach a grape type to the active planting of a parcel
    pub async fn assign_grape_type_to_parcel(
        &self,
        parcel_id: Uuid,
        grape_type_id: Uuid,
    ) -> AppResult<Planting> {
        let mut tx = self.storage.begin().await?;
        let result = Self::assign_to_parcel(&mut *tx, parcel_id, grape_type_id).await;
        let planting = storage::finish(tx, result).await?;

        tracing::info!(
            planting_id = %planting.id,
            parcel_id = %parcel_id,
            grape_type_id = %grape_type_id,
            "Grape type assigned to active planting"
        );

        Ok(planting)
    }

    async fn assign_to_parcel(
        tx: &mut dyn StorageTx,
        parcel_id: Uuid,
        grape_type_id: Uuid,
    ) -> AppResult<Planting> {
        let snapshot = storage::require_parcel(tx, parcel_id).await?;
        if tx.fetch_grape_type(grape_type_id).await?.is_none() {
            return Err(AppError::NotFound("Grape type".to_string()));
        }
        attach_locked(tx, parcel_id, &snapshot, grape_type_id).await
    }

    /// The active planting of a parcel
    pub async fn get_active_planting(&self, parcel_id: Uuid) -> AppResult<PlantingView> {
        self.get_history(parcel_id)
            .await?
            .into_iter()
            .find(|view| view.planting.is_active())
            .ok_or_else(|| AppError::NotFound("Active planting".to_string()))
    }

    /// Every planting of a parcel, most recent first
    pub async fn get_history(&self, parcel_id: Uuid) -> AppResult<Vec<PlantingView>> {
        if self.storage.get_parcel(parcel_id).await?.is_none() {
            return Err(AppError::NotFound("Parcel".to_string()));
        }
        self.storage.planting_history(parcel_id).await
    }

    /// A planting with its parcel name and the parcel's latest soil reading
    pub async fn get_planting(&self, id: Uuid) -> AppResult<PlantingDetail> {
        let view = self
            .storage
            .get_planting(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Planting".to_string()))?;

        let parcel_id = view.planting.parcel_id;
        let parcel = self
            .storage
            .get_parcel(parcel_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parcel".to_string()))?;
        let latest_soil_control = self
            .storage
            .soil_control_history(parcel_id)
            .await?
            .into_iter()
            .next();

        Ok(PlantingDetail {
            view,
            parcel_name: parcel.name,
            latest_soil_control,
        })
    }

    /// Plantings grouped by parcel, for parcels with at least one planting
    pub async fn list_overview(&self) -> AppResult<Vec<ParcelPlantings>> {
        let mut by_parcel: HashMap<Uuid, Vec<PlantingView>> = HashMap::new();
        for view in self.storage.all_plantings().await? {
            by_parcel
                .entry(view.planting.parcel_id)
                .or_default()
                .push(view);
        }

        let parcels = self.storage.list_parcels().await?;

        Ok(parcels
            .into_iter()
            .filter_map(|parcel| {
                let history = by_parcel.remove(&parcel.id)?;
                let current = history.iter().find(|v| v.planting.is_active()).cloned();
                Some(ParcelPlantings {
                    parcel: ParcelRef {
                        id: parcel.id,
                        name: parcel.name,
                    },
                    current,
                    history,
                })
            })
            .collect())
    }
}

/// Lock the parcel owning a planting and return the planting as seen under
/// that lock, with the parcel's snapshot
async fn lock_planting(
    tx: &mut dyn StorageTx,
    id: Uuid,
) -> AppResult<(Planting, ParcelSnapshot)> {
    let parcel_id = tx
        .fetch_planting(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Planting".to_string()))?
        .parcel_id;

    let snapshot = storage::require_parcel(tx, parcel_id).await?;

    let planting = tx
        .fetch_planting(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Planting".to_string()))?;

    Ok((planting, snapshot))
}

/// Lock a parcel and attach `grape_type_id` to its active, unassigned planting.
/// The caller has already checked the grape type exists.
pub(crate) async fn attach_to_active_planting(
    tx: &mut dyn StorageTx,
    parcel_id: Uuid,
    grape_type_id: Uuid,
) -> AppResult<Planting> {
    let snapshot = storage::require_parcel(tx, parcel_id).await?;
    attach_locked(tx, parcel_id, &snapshot, grape_type_id).await
}

async fn attach_locked(
    tx: &mut dyn StorageTx,
    parcel_id: Uuid,
    snapshot: &ParcelSnapshot,
    grape_type_id: Uuid,
) -> AppResult<Planting> {
    check_guard(parcel_id, snapshot, GuardAction::AssignGrapeType)?;

    let mut planting = tx
        .active_planting(parcel_id)
        .await?
        .ok_or(GuardViolation::NoActivePlanting)?;

    planting.grape_type_id = Some(grape_type_id);
    tx.update_planting(&planting).await
}
