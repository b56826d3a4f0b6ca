//! In-memory storage for tests and local demos
//!
//! A transaction takes the store's async mutex for its whole lifetime and
//! works on a private copy of the state. Commit writes the copy back; rollback
//! drops it. Concurrent writers therefore run one after another, which gives
//! the same guarantees the parcel row lock gives on PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    AccountCredentials, NewAccount, NewGrapeType, NewParcel, NewPlanting, ParcelRef, Storage,
    StorageTx,
};
use crate::error::{AppError, AppResult};
use shared::{
    role_ids, Account, DimensionRecord, Dimensions, GrapeType, GuardViolation, Parcel,
    ParcelSnapshot, Planting, PlantingState, PlantingView, SoilControlRecord, SoilReading,
};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: String,
}

/// Rows in insertion order, which is also creation order
#[derive(Debug, Clone)]
struct MemoryState {
    parcels: Vec<Parcel>,
    dimensions: Vec<DimensionRecord>,
    soil_controls: Vec<SoilControlRecord>,
    grape_types: Vec<GrapeType>,
    plantings: Vec<Planting>,
    accounts: Vec<StoredAccount>,
    roles: Vec<i32>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            parcels: Vec::new(),
            dimensions: Vec::new(),
            soil_controls: Vec::new(),
            grape_types: Vec::new(),
            plantings: Vec::new(),
            accounts: Vec::new(),
            roles: role_ids::ALL.to_vec(),
        }
    }
}

impl MemoryState {
    fn parcel_exists(&self, id: Uuid) -> bool {
        self.parcels.iter().any(|p| p.id == id)
    }

    fn grape_type_name(&self, id: Option<Uuid>) -> Option<String> {
        let id = id?;
        self.grape_types
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.name.clone())
    }

    fn view(&self, planting: &Planting) -> PlantingView {
        PlantingView {
            planting: planting.clone(),
            grape_type_name: self.grape_type_name(planting.grape_type_id),
        }
    }

    fn snapshot(&self, parcel_id: Uuid) -> ParcelSnapshot {
        let active: Vec<&Planting> = self
            .plantings
            .iter()
            .filter(|p| p.parcel_id == parcel_id && p.is_active())
            .collect();

        ParcelSnapshot {
            dimension_count: self
                .dimensions
                .iter()
                .filter(|d| d.parcel_id == parcel_id)
                .count() as i64,
            soil_control_count: self
                .soil_controls
                .iter()
                .filter(|s| s.parcel_id == parcel_id)
                .count() as i64,
            active_planting_count: active.len() as i64,
            active_planting_has_grape_type: active.iter().any(|p| p.grape_type_id.is_some()),
        }
    }

    /// Mirrors the `plantings_one_active_per_parcel` unique index
    fn check_one_active(&self, planting: &Planting) -> AppResult<()> {
        if !planting.is_active() {
            return Ok(());
        }
        let clash = self.plantings.iter().any(|p| {
            p.parcel_id == planting.parcel_id && p.is_active() && p.id != planting.id
        });
        if clash {
            return Err(GuardViolation::ActivePlantingExists.into());
        }
        Ok(())
    }

    fn name_clash<'a>(
        mut names: impl Iterator<Item = (Uuid, &'a str)>,
        name: &str,
        exclude: Option<Uuid>,
    ) -> bool {
        let wanted = name.trim().to_lowercase();
        names.any(|(id, existing)| Some(id) != exclude && existing.to_lowercase() == wanted)
    }
}

/// Storage kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A transaction over [`MemoryStorage`]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin(&self) -> AppResult<Box<dyn StorageTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_parcel(&self, id: Uuid) -> AppResult<Option<Parcel>> {
        let state = self.state.lock().await;
        Ok(state.parcels.iter().find(|p| p.id == id).cloned())
    }

    async fn list_parcels(&self) -> AppResult<Vec<Parcel>> {
        let state = self.state.lock().await;
        let mut parcels = state.parcels.clone();
        parcels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parcels)
    }

    async fn dimension_history(&self, parcel_id: Uuid) -> AppResult<Vec<DimensionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .dimensions
            .iter()
            .rev()
            .filter(|d| d.parcel_id == parcel_id)
            .cloned()
            .collect())
    }

    async fn all_dimensions(&self) -> AppResult<Vec<DimensionRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<DimensionRecord> = state.dimensions.iter().rev().cloned().collect();
        records.sort_by_key(|d| d.parcel_id);
        Ok(records)
    }

    async fn latest_dimensions(&self) -> AppResult<Vec<DimensionRecord>> {
        let mut records = self.all_dimensions().await?;
        records.dedup_by_key(|d| d.parcel_id);
        Ok(records)
    }

    async fn soil_control_history(&self, parcel_id: Uuid) -> AppResult<Vec<SoilControlRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .soil_controls
            .iter()
            .rev()
            .filter(|s| s.parcel_id == parcel_id)
            .cloned()
            .collect())
    }

    async fn latest_soil_controls(&self) -> AppResult<Vec<SoilControlRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<SoilControlRecord> =
            state.soil_controls.iter().rev().cloned().collect();
        records.sort_by_key(|s| s.parcel_id);
        records.dedup_by_key(|s| s.parcel_id);
        Ok(records)
    }

    async fn get_planting(&self, id: Uuid) -> AppResult<Option<PlantingView>> {
        let state = self.state.lock().await;
        Ok(state
            .plantings
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.view(p)))
    }

    async fn planting_history(&self, parcel_id: Uuid) -> AppResult<Vec<PlantingView>> {
        let state = self.state.lock().await;
        Ok(state
            .plantings
            .iter()
            .rev()
            .filter(|p| p.parcel_id == parcel_id)
            .map(|p| state.view(p))
            .collect())
    }

    async fn all_plantings(&self) -> AppResult<Vec<PlantingView>> {
        let state = self.state.lock().await;
        let mut views: Vec<PlantingView> =
            state.plantings.iter().rev().map(|p| state.view(p)).collect();
        views.sort_by_key(|v| v.planting.parcel_id);
        Ok(views)
    }

    async fn get_grape_type(&self, id: Uuid) -> AppResult<Option<GrapeType>> {
        let state = self.state.lock().await;
        Ok(state.grape_types.iter().find(|g| g.id == id).cloned())
    }

    async fn list_grape_types(&self) -> AppResult<Vec<GrapeType>> {
        let state = self.state.lock().await;
        let mut grape_types = state.grape_types.clone();
        grape_types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(grape_types)
    }

    async fn grape_type_parcels(&self) -> AppResult<Vec<(Uuid, ParcelRef)>> {
        let state = self.state.lock().await;
        let mut pairs: Vec<(Uuid, ParcelRef)> = state
            .plantings
            .iter()
            .filter_map(|planting| {
                let grape_type_id = planting.grape_type_id?;
                let parcel = state.parcels.iter().find(|p| p.id == planting.parcel_id)?;
                Some((
                    grape_type_id,
                    ParcelRef {
                        id: parcel.id,
                        name: parcel.name.clone(),
                    },
                ))
            })
            .collect();
        pairs.sort_by(|a, b| (a.0, &a.1.name).cmp(&(b.0, &b.1.name)));
        pairs.dedup_by(|a, b| a.0 == b.0 && a.1.id == b.1.id);
        Ok(pairs)
    }

    async fn find_account(&self, identifier: &str) -> AppResult<Option<AccountCredentials>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.account.identifier == identifier)
            .map(|stored| AccountCredentials {
                account: stored.account.clone(),
                password_hash: stored.password_hash.clone(),
            }))
    }
}

#[async_trait]
impl StorageTx for MemoryTx {
    async fn lock_parcel(&mut self, parcel_id: Uuid) -> AppResult<Option<ParcelSnapshot>> {
        if !self.working.parcel_exists(parcel_id) {
            return Ok(None);
        }
        Ok(Some(self.working.snapshot(parcel_id)))
    }

    async fn fetch_parcel(&mut self, parcel_id: Uuid) -> AppResult<Option<Parcel>> {
        Ok(self
            .working
            .parcels
            .iter()
            .find(|p| p.id == parcel_id)
            .cloned())
    }

    async fn parcel_name_taken(&mut self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let names = self.working.parcels.iter().map(|p| (p.id, p.name.as_str()));
        Ok(MemoryState::name_clash(names, name, exclude))
    }

    async fn insert_parcel(&mut self, parcel: &NewParcel) -> AppResult<Parcel> {
        if self.parcel_name_taken(&parcel.name, None).await? {
            return Err(AppError::validation(
                "name",
                "A parcel with this name already exists",
                "Ya existe una parcela con ese nombre",
            ));
        }
        let now = Utc::now();
        let stored = Parcel {
            id: Uuid::new_v4(),
            name: parcel.name.trim().to_string(),
            location_description: parcel.location_description.clone(),
            coordinates: parcel.coordinates,
            status: parcel.status,
            created_at: now,
            updated_at: now,
        };
        self.working.parcels.push(stored.clone());
        Ok(stored)
    }

    async fn update_parcel(&mut self, parcel: &Parcel) -> AppResult<Parcel> {
        let slot = self
            .working
            .parcels
            .iter_mut()
            .find(|p| p.id == parcel.id)
            .ok_or_else(|| AppError::NotFound("Parcel".to_string()))?;
        *slot = Parcel {
            name: parcel.name.trim().to_string(),
            updated_at: Utc::now(),
            ..parcel.clone()
        };
        Ok(slot.clone())
    }

    async fn insert_dimensions(
        &mut self,
        parcel_id: Uuid,
        dimensions: &Dimensions,
    ) -> AppResult<DimensionRecord> {
        let record = DimensionRecord {
            id: Uuid::new_v4(),
            parcel_id,
            dimensions: *dimensions,
            created_at: Utc::now(),
        };
        self.working.dimensions.push(record.clone());
        Ok(record)
    }

    async fn insert_soil_control(
        &mut self,
        parcel_id: Uuid,
        reading: &SoilReading,
    ) -> AppResult<SoilControlRecord> {
        let record = SoilControlRecord {
            id: Uuid::new_v4(),
            parcel_id,
            reading: reading.clone(),
            created_at: Utc::now(),
        };
        self.working.soil_controls.push(record.clone());
        Ok(record)
    }

    async fn fetch_grape_type(&mut self, id: Uuid) -> AppResult<Option<GrapeType>> {
        Ok(self.working.grape_types.iter().find(|g| g.id == id).cloned())
    }

    async fn lock_grape_type(&mut self, id: Uuid) -> AppResult<Option<GrapeType>> {
        self.fetch_grape_type(id).await
    }

    async fn grape_type_name_taken(
        &mut self,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let names = self
            .working
            .grape_types
            .iter()
            .map(|g| (g.id, g.name.as_str()));
        Ok(MemoryState::name_clash(names, name, exclude))
    }

    async fn insert_grape_type(&mut self, grape_type: &NewGrapeType) -> AppResult<GrapeType> {
        let now = Utc::now();
        let stored = GrapeType {
            id: Uuid::new_v4(),
            name: grape_type.name.trim().to_string(),
            description: grape_type.description.clone(),
            requirements: grape_type.requirements,
            created_at: now,
            updated_at: now,
        };
        self.working.grape_types.push(stored.clone());
        Ok(stored)
    }

    async fn update_grape_type(&mut self, grape_type: &GrapeType) -> AppResult<GrapeType> {
        let slot = self
            .working
            .grape_types
            .iter_mut()
            .find(|g| g.id == grape_type.id)
            .ok_or_else(|| AppError::NotFound("Grape type".to_string()))?;
        *slot = GrapeType {
            name: grape_type.name.trim().to_string(),
            updated_at: Utc::now(),
            ..grape_type.clone()
        };
        Ok(slot.clone())
    }

    async fn fetch_planting(&mut self, id: Uuid) -> AppResult<Option<Planting>> {
        Ok(self.working.plantings.iter().find(|p| p.id == id).cloned())
    }

    async fn active_planting(&mut self, parcel_id: Uuid) -> AppResult<Option<Planting>> {
        Ok(self
            .working
            .plantings
            .iter()
            .find(|p| p.parcel_id == parcel_id && p.is_active())
            .cloned())
    }

    async fn insert_planting(&mut self, planting: &NewPlanting) -> AppResult<Planting> {
        let now = Utc::now();
        let stored = Planting {
            id: Uuid::new_v4(),
            parcel_id: planting.parcel_id,
            grape_type_id: planting.grape_type_id,
            technique: planting.technique.trim().to_string(),
            planting_date: planting.planting_date,
            plant_count: planting.plant_count,
            observations: planting.observations.clone(),
            state: PlantingState::Active,
            created_at: now,
            updated_at: now,
        };
        self.working.check_one_active(&stored)?;
        self.working.plantings.push(stored.clone());
        Ok(stored)
    }

    async fn update_planting(&mut self, planting: &Planting) -> AppResult<Planting> {
        self.working.check_one_active(planting)?;
        let slot = self
            .working
            .plantings
            .iter_mut()
            .find(|p| p.id == planting.id)
            .ok_or_else(|| AppError::NotFound("Planting".to_string()))?;
        *slot = Planting {
            technique: planting.technique.trim().to_string(),
            updated_at: Utc::now(),
            ..planting.clone()
        };
        Ok(slot.clone())
    }

    async fn account_exists(&mut self, identifier: &str, email: &str) -> AppResult<bool> {
        Ok(self.working.accounts.iter().any(|stored| {
            stored.account.identifier == identifier
                || stored.account.email.eq_ignore_ascii_case(email)
        }))
    }

    async fn unknown_roles(&mut self, roles: &[i32]) -> AppResult<Vec<i32>> {
        Ok(roles
            .iter()
            .copied()
            .filter(|role| !self.working.roles.contains(role))
            .collect())
    }

    async fn insert_account(&mut self, account: &NewAccount) -> AppResult<Account> {
        let stored = StoredAccount {
            account: Account {
                id: Uuid::new_v4(),
                identifier: account.identifier.clone(),
                first_name: account.first_name.clone(),
                last_name: account.last_name.clone(),
                email: account.email.clone(),
                enabled: true,
                roles: account.roles.clone(),
                created_at: Utc::now(),
            },
            password_hash: account.password_hash.clone(),
        };
        self.working.accounts.push(stored.clone());
        Ok(stored.account)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
