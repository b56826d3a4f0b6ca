//! Dimension ledger service

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::check_guard;
use crate::error::{AppError, AppResult};
use crate::storage::{self, DynStorage, ParcelRef, StorageTx};
use shared::{validate_dimensions, DimensionRecord, Dimensions, GuardAction, LedgerView};

/// Dimension service for the append-only measurement ledger
#[derive(Clone)]
pub struct DimensionService {
    storage: DynStorage,
}

/// Dimension ledger of one parcel in the overview
#[derive(Debug, Clone, Serialize)]
pub struct ParcelDimensions {
    pub parcel: ParcelRef,
    #[serde(flatten)]
    pub ledger: LedgerView<DimensionRecord>,
}

impl DimensionService {
    /// Create a new DimensionService instance
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Append a dimension record; refused while the parcel has an active planting
    pub async fn record_dimensions(
        &self,
        parcel_id: Uuid,
        dimensions: Dimensions,
    ) -> AppResult<DimensionRecord> {
        validate_dimensions(&dimensions)?;

        let mut tx = self.storage.begin().await?;
        let result = Self::append(&mut *tx, parcel_id, &dimensions).await;
        let record = storage::finish(tx, result).await?;

        tracing::info!(
            parcel_id = %parcel_id,
            record_id = %record.id,
            surface = %record.dimensions.surface,
            "Dimensions recorded"
        );

        Ok(record)
    }

    async fn append(
        tx: &mut dyn StorageTx,
        parcel_id: Uuid,
        dimensions: &Dimensions,
    ) -> AppResult<DimensionRecord> {
        let snapshot = storage::require_parcel(tx, parcel_id).await?;
        check_guard(parcel_id, &snapshot, GuardAction::RecordDimensions)?;
        tx.insert_dimensions(parcel_id, dimensions).await
    }

    /// Current record and full history of a parcel, newest first
    pub async fn get_current_and_history(
        &self,
        parcel_id: Uuid,
    ) -> AppResult<LedgerView<DimensionRecord>> {
        if self.storage.get_parcel(parcel_id).await?.is_none() {
            return Err(AppError::NotFound("Parcel".to_string()));
        }

        let history = self.storage.dimension_history(parcel_id).await?;
        Ok(LedgerView::from_history(history))
    }

    /// Ledgers of every parcel that has at least one record, by parcel name
    pub async fn list_overview(&self) -> AppResult<Vec<ParcelDimensions>> {
        let mut by_parcel: HashMap<Uuid, Vec<DimensionRecord>> = HashMap::new();
        for record in self.storage.all_dimensions().await? {
            by_parcel.entry(record.parcel_id).or_default().push(record);
        }

        let parcels = self.storage.list_parcels().await?;

        Ok(parcels
            .into_iter()
            .filter_map(|parcel| {
                let history = by_parcel.remove(&parcel.id)?;
                Some(ParcelDimensions {
                    parcel: ParcelRef {
                        id: parcel.id,
                        name: parcel.name,
                    },
                    ledger: LedgerView::from_history(history),
                })
            })
            .collect())
    }
}
