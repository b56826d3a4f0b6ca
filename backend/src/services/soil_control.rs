//! Soil-control ledger service

use uuid::Uuid;

use super::check_guard;
use crate::error::{AppError, AppResult};
use crate::storage::{self, DynStorage, StorageTx};
use shared::{validate_soil_reading, GuardAction, LedgerView, SoilControlRecord, SoilReading};

/// Soil-control service for the append-only reading ledger
#[derive(Clone)]
pub struct SoilControlService {
    storage: DynStorage,
}

impl SoilControlService {
    /// Create a new SoilControlService instance
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Append a soil reading; the parcel must already have dimensions
    pub async fn record_control(
        &self,
        parcel_id: Uuid,
        reading: SoilReading,
    ) -> AppResult<SoilControlRecord> {
        validate_soil_reading(&reading)?;

        let mut tx = self.storage.begin().await?;
        let result = Self::append(&mut *tx, parcel_id, &reading).await;
        let record = storage::finish(tx, result).await?;

        tracing::info!(
            parcel_id = %parcel_id,
            record_id = %record.id,
            ph = %record.reading.ph,
            "Soil control recorded"
        );

        Ok(record)
    }

    async fn append(
        tx: &mut dyn StorageTx,
        parcel_id: Uuid,
        reading: &SoilReading,
    ) -> AppResult<SoilControlRecord> {
        let snapshot = storage::require_parcel(tx, parcel_id).await?;
        check_guard(parcel_id, &snapshot, GuardAction::RecordSoilControl)?;
        tx.insert_soil_control(parcel_id, reading).await
    }

    /// Current reading and full history of a parcel, newest first
    pub async fn get_current_and_history(
        &self,
        parcel_id: Uuid,
    ) -> AppResult<LedgerView<SoilControlRecord>> {
        if self.storage.get_parcel(parcel_id).await?.is_none() {
            return Err(AppError::NotFound("Parcel".to_string()));
        }

        let history = self.storage.soil_control_history(parcel_id).await?;
        Ok(LedgerView::from_history(history))
    }
}
