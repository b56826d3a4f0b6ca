//! Storage capability for the Vineyard Management Platform
//!
//! Services receive an `Arc<dyn Storage>` instead of a pool, so the same
//! business rules run against PostgreSQL in production and against the
//! in-memory store in tests. Every prerequisite-checking write goes through a
//! [`StorageTx`] whose first step is [`StorageTx::lock_parcel`].

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{
    Account, DimensionRecord, Dimensions, GeoPoint, GrapeRequirements, GrapeType, Parcel,
    ParcelSnapshot, ParcelStatus, Planting, PlantingView, SoilControlRecord, SoilReading,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Shared handle to the storage backend
pub type DynStorage = Arc<dyn Storage>;

/// Parcel fields for insertion
#[derive(Debug, Clone)]
pub struct NewParcel {
    pub name: String,
    pub location_description: String,
    pub coordinates: GeoPoint,
    pub status: ParcelStatus,
}

/// Grape type fields for insertion
#[derive(Debug, Clone)]
pub struct NewGrapeType {
    pub name: String,
    pub description: Option<String>,
    pub requirements: GrapeRequirements,
}

/// Planting fields for insertion; state always starts active
#[derive(Debug, Clone)]
pub struct NewPlanting {
    pub parcel_id: Uuid,
    pub grape_type_id: Option<Uuid>,
    pub technique: String,
    pub planting_date: NaiveDate,
    pub plant_count: i32,
    pub observations: Option<String>,
}

/// Account fields for insertion
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub identifier: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub roles: Vec<i32>,
}

/// Account together with its stored password hash
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account: Account,
    pub password_hash: String,
}

/// Minimal parcel reference used in catalog views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParcelRef {
    pub id: Uuid,
    pub name: String,
}

/// Read access and transaction entry point
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a write transaction
    async fn begin(&self) -> AppResult<Box<dyn StorageTx>>;

    /// Connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()>;

    async fn get_parcel(&self, id: Uuid) -> AppResult<Option<Parcel>>;

    /// All parcels ordered by name
    async fn list_parcels(&self) -> AppResult<Vec<Parcel>>;

    /// Dimension records of a parcel, newest first
    async fn dimension_history(&self, parcel_id: Uuid) -> AppResult<Vec<DimensionRecord>>;

    /// Dimension records of every parcel, newest first within a parcel
    async fn all_dimensions(&self) -> AppResult<Vec<DimensionRecord>>;

    /// Newest dimension record per parcel
    async fn latest_dimensions(&self) -> AppResult<Vec<DimensionRecord>>;

    /// Soil-control records of a parcel, newest first
    async fn soil_control_history(&self, parcel_id: Uuid) -> AppResult<Vec<SoilControlRecord>>;

    /// Newest soil-control record per parcel
    async fn latest_soil_controls(&self) -> AppResult<Vec<SoilControlRecord>>;

    async fn get_planting(&self, id: Uuid) -> AppResult<Option<PlantingView>>;

    /// Plantings of a parcel, newest first
    async fn planting_history(&self, parcel_id: Uuid) -> AppResult<Vec<PlantingView>>;

    /// Every planting, newest first within a parcel
    async fn all_plantings(&self) -> AppResult<Vec<PlantingView>>;

    async fn get_grape_type(&self, id: Uuid) -> AppResult<Option<GrapeType>>;

    /// All grape types ordered by name
    async fn list_grape_types(&self) -> AppResult<Vec<GrapeType>>;

    /// Distinct parcels with at least one planting of each grape type,
    /// as `(grape_type_id, parcel)` pairs
    async fn grape_type_parcels(&self) -> AppResult<Vec<(Uuid, ParcelRef)>>;

    async fn find_account(&self, identifier: &str) -> AppResult<Option<AccountCredentials>>;
}

/// Operations available inside one atomic write
#[async_trait]
pub trait StorageTx: Send {
    /// Lock the parcel row for the rest of the transaction and return its
    /// consistency snapshot, or `None` if the parcel does not exist
    async fn lock_parcel(&mut self, parcel_id: Uuid) -> AppResult<Option<ParcelSnapshot>>;

    async fn fetch_parcel(&mut self, parcel_id: Uuid) -> AppResult<Option<Parcel>>;

    /// Case-insensitive name check, optionally ignoring one parcel
    async fn parcel_name_taken(&mut self, name: &str, exclude: Option<Uuid>) -> AppResult<bool>;

    async fn insert_parcel(&mut self, parcel: &NewParcel) -> AppResult<Parcel>;

    /// Persist name, location, coordinates and status
    async fn update_parcel(&mut self, parcel: &Parcel) -> AppResult<Parcel>;

    async fn insert_dimensions(
        &mut self,
        parcel_id: Uuid,
        dimensions: &Dimensions,
    ) -> AppResult<DimensionRecord>;

    async fn insert_soil_control(
        &mut self,
        parcel_id: Uuid,
        reading: &SoilReading,
    ) -> AppResult<SoilControlRecord>;

    /// Read a grape type without locking it. Grape types are never deleted,
    /// so an existence check holds for the rest of the transaction.
    async fn fetch_grape_type(&mut self, id: Uuid) -> AppResult<Option<GrapeType>>;

    /// Lock a grape type row ahead of rewriting it
    async fn lock_grape_type(&mut self, id: Uuid) -> AppResult<Option<GrapeType>>;

    async fn grape_type_name_taken(&mut self, name: &str, exclude: Option<Uuid>)
        -> AppResult<bool>;

    async fn insert_grape_type(&mut self, grape_type: &NewGrapeType) -> AppResult<GrapeType>;

    /// Persist name, description and requirements
    async fn update_grape_type(&mut self, grape_type: &GrapeType) -> AppResult<GrapeType>;

    async fn fetch_planting(&mut self, id: Uuid) -> AppResult<Option<Planting>>;

    /// The active planting of a parcel, if any
    async fn active_planting(&mut self, parcel_id: Uuid) -> AppResult<Option<Planting>>;

    async fn insert_planting(&mut self, planting: &NewPlanting) -> AppResult<Planting>;

    /// Persist every mutable planting column (fields, state, grape type)
    async fn update_planting(&mut self, planting: &Planting) -> AppResult<Planting>;

    /// Whether the identifier or email already belongs to an account
    async fn account_exists(&mut self, identifier: &str, email: &str) -> AppResult<bool>;

    /// Requested role ids that are not defined
    async fn unknown_roles(&mut self, roles: &[i32]) -> AppResult<Vec<i32>>;

    async fn insert_account(&mut self, account: &NewAccount) -> AppResult<Account>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged and replaces the original error.
pub async fn finish<T>(tx: Box<dyn StorageTx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    original = %err,
                    "Rollback failed: {}",
                    rollback_err
                );
                return Err(rollback_err);
            }
            Err(err)
        }
    }
}

/// Lock a parcel or fail with `NotFound`
pub async fn require_parcel(tx: &mut dyn StorageTx, parcel_id: Uuid) -> AppResult<ParcelSnapshot> {
    tx.lock_parcel(parcel_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Parcel".to_string()))
}
