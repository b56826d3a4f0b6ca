//! Shared fixtures for backend integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use shared::{Dimensions, ParcelStatus, RequirementRange, SoilReading};
use vineyard_backend::config::{
    BootstrapConfig, Config, DatabaseConfig, JwtConfig, ServerConfig,
};
use vineyard_backend::services::grape_type::CreateGrapeTypeInput;
use vineyard_backend::services::parcel::CreateParcelInput;
use vineyard_backend::services::planting::CreatePlantingInput;
use vineyard_backend::services::{
    DimensionService, GrapeTypeService, ParcelService, PlantingService, SoilControlService,
};
use vineyard_backend::storage::{DynStorage, MemoryStorage};

pub const JWT_SECRET: &str = "integration-test-secret";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn memory_storage() -> DynStorage {
    Arc::new(MemoryStorage::new())
}

pub fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout_secs: 1,
            statement_timeout_secs: 1,
        },
        jwt: JwtConfig::for_testing(JWT_SECRET),
        bootstrap: BootstrapConfig::default(),
    }
}

/// All services over one storage
pub struct Services {
    pub storage: DynStorage,
    pub parcels: ParcelService,
    pub dimensions: DimensionService,
    pub soil_controls: SoilControlService,
    pub plantings: PlantingService,
    pub grape_types: GrapeTypeService,
}

impl Services {
    pub fn in_memory() -> Self {
        Self::over(memory_storage())
    }

    pub fn over(storage: DynStorage) -> Self {
        Self {
            parcels: ParcelService::new(storage.clone()),
            dimensions: DimensionService::new(storage.clone()),
            soil_controls: SoilControlService::new(storage.clone()),
            plantings: PlantingService::new(storage.clone()),
            grape_types: GrapeTypeService::new(storage.clone()),
            storage,
        }
    }

    /// Create a bare parcel and return its id
    pub async fn parcel(&self, name: &str) -> Uuid {
        self.parcels
            .create_parcel(parcel_input(name, "-71.2", "-33.4"))
            .await
            .unwrap()
            .parcel
            .id
    }

    /// Create a parcel with dimensions and a soil control, ready for planting
    pub async fn ready_parcel(&self, name: &str) -> Uuid {
        let id = self.parcel(name).await;
        self.dimensions
            .record_dimensions(id, dimensions("1000", "5"))
            .await
            .unwrap();
        self.soil_controls
            .record_control(id, reading("6.5"))
            .await
            .unwrap();
        id
    }

    /// Create a parcel with an active planting and return (parcel, planting)
    pub async fn planted_parcel(&self, name: &str) -> (Uuid, Uuid) {
        let parcel_id = self.ready_parcel(name).await;
        let planting = self
            .plantings
            .create_planting(planting_input(parcel_id, 500))
            .await
            .unwrap();
        (parcel_id, planting.id)
    }
}

pub fn parcel_input(name: &str, longitude: &str, latitude: &str) -> CreateParcelInput {
    CreateParcelInput {
        name: name.to_string(),
        location_description: "Maipo valley".to_string(),
        longitude: dec(longitude),
        latitude: dec(latitude),
        status: ParcelStatus::Available,
        initial_dimensions: None,
        initial_soil_control: None,
    }
}

pub fn dimensions(surface: &str, slope: &str) -> Dimensions {
    Dimensions {
        surface: dec(surface),
        length: dec("50"),
        width: dec("20"),
        slope: dec(slope),
    }
}

pub fn reading(ph: &str) -> SoilReading {
    SoilReading {
        ph: dec(ph),
        humidity: dec("40"),
        temperature: dec("18"),
        observations: None,
    }
}

pub fn planting_input(parcel_id: Uuid, plant_count: i32) -> CreatePlantingInput {
    CreatePlantingInput {
        parcel_id,
        grape_type_id: None,
        planting_date: NaiveDate::from_ymd_opt(2024, 9, 15).unwrap(),
        plant_count,
        technique: "trellis".to_string(),
        observations: None,
    }
}

pub fn grape_type_input(name: &str, parcel_ids: Vec<Uuid>) -> CreateGrapeTypeInput {
    CreateGrapeTypeInput {
        name: name.to_string(),
        description: Some("Red cultivar".to_string()),
        ph: RequirementRange::new(dec("5.5"), dec("7")),
        humidity: RequirementRange::new(dec("30"), dec("60")),
        temperature: RequirementRange::new(dec("10"), dec("30")),
        harvest_duration_days: 180,
        parcel_ids,
    }
}
