//! PostgreSQL storage backed by sqlx

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use std::{str::FromStr, time::Duration};
use uuid::Uuid;

use super::{
    AccountCredentials, NewAccount, NewGrapeType, NewParcel, NewPlanting, ParcelRef, Storage,
    StorageTx,
};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use shared::{
    Account, DimensionRecord, Dimensions, GeoPoint, GrapeRequirements, GrapeType, Parcel,
    ParcelSnapshot, ParcelStatus, Planting, PlantingState, PlantingView, RequirementRange,
    SoilControlRecord, SoilReading,
};

/// Storage over a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStorage {
    db: PgPool,
}

impl PgStorage {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a pool whose connections carry the configured statement timeout
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::from_str(&config.url)?.options([(
            "statement_timeout",
            format!("{}s", config.statement_timeout_secs),
        )]);

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self::new(db))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

/// An open PostgreSQL transaction
pub struct PgStorageTx {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ParcelRow {
    id: Uuid,
    name: String,
    location_description: String,
    longitude: Decimal,
    latitude: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ParcelRow> for Parcel {
    type Error = AppError;

    fn try_from(row: ParcelRow) -> Result<Self, Self::Error> {
        let status = ParcelStatus::from_code(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown parcel status: {}", row.status)))?;
        Ok(Parcel {
            id: row.id,
            name: row.name,
            location_description: row.location_description,
            coordinates: GeoPoint::new(row.longitude, row.latitude),
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DimensionRow {
    id: Uuid,
    parcel_id: Uuid,
    surface: Decimal,
    length: Decimal,
    width: Decimal,
    slope: Decimal,
    created_at: DateTime<Utc>,
}

impl From<DimensionRow> for DimensionRecord {
    fn from(row: DimensionRow) -> Self {
        DimensionRecord {
            id: row.id,
            parcel_id: row.parcel_id,
            dimensions: Dimensions {
                surface: row.surface,
                length: row.length,
                width: row.width,
                slope: row.slope,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SoilControlRow {
    id: Uuid,
    parcel_id: Uuid,
    ph: Decimal,
    humidity: Decimal,
    temperature: Decimal,
    observations: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SoilControlRow> for SoilControlRecord {
    fn from(row: SoilControlRow) -> Self {
        SoilControlRecord {
            id: row.id,
            parcel_id: row.parcel_id,
            reading: SoilReading {
                ph: row.ph,
                humidity: row.humidity,
                temperature: row.temperature,
                observations: row.observations,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrapeTypeRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    ph_min: Decimal,
    ph_max: Decimal,
    humidity_min: Decimal,
    humidity_max: Decimal,
    temperature_min: Decimal,
    temperature_max: Decimal,
    harvest_duration_days: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GrapeTypeRow> for GrapeType {
    fn from(row: GrapeTypeRow) -> Self {
        GrapeType {
            id: row.id,
            name: row.name,
            description: row.description,
            requirements: GrapeRequirements {
                ph: RequirementRange::new(row.ph_min, row.ph_max),
                humidity: RequirementRange::new(row.humidity_min, row.humidity_max),
                temperature: RequirementRange::new(row.temperature_min, row.temperature_max),
                harvest_duration_days: row.harvest_duration_days,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlantingRow {
    id: Uuid,
    parcel_id: Uuid,
    grape_type_id: Option<Uuid>,
    technique: String,
    planting_date: NaiveDate,
    plant_count: i32,
    observations: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlantingRow> for Planting {
    type Error = AppError;

    fn try_from(row: PlantingRow) -> Result<Self, Self::Error> {
        let state = PlantingState::from_code(&row.state)
            .ok_or_else(|| AppError::Internal(format!("Unknown planting state: {}", row.state)))?;
        Ok(Planting {
            id: row.id,
            parcel_id: row.parcel_id,
            grape_type_id: row.grape_type_id,
            technique: row.technique,
            planting_date: row.planting_date,
            plant_count: row.plant_count,
            observations: row.observations,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlantingViewRow {
    #[sqlx(flatten)]
    planting: PlantingRow,
    grape_type_name: Option<String>,
}

impl TryFrom<PlantingViewRow> for PlantingView {
    type Error = AppError;

    fn try_from(row: PlantingViewRow) -> Result<Self, Self::Error> {
        Ok(PlantingView {
            planting: row.planting.try_into()?,
            grape_type_name: row.grape_type_name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    identifier: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    email: String,
    enabled: bool,
    roles: Vec<i32>,
    created_at: DateTime<Utc>,
}

fn collect_parcels(rows: Vec<ParcelRow>) -> AppResult<Vec<Parcel>> {
    rows.into_iter().map(Parcel::try_from).collect()
}

fn collect_views(rows: Vec<PlantingViewRow>) -> AppResult<Vec<PlantingView>> {
    rows.into_iter().map(PlantingView::try_from).collect()
}

const PLANTING_VIEW_SELECT: &str = r#"
    SELECT p.id, p.parcel_id, p.grape_type_id, p.technique, p.planting_date, p.plant_count,
           p.observations, p.state, p.created_at, p.updated_at, g.name AS grape_type_name
    FROM plantings p
    LEFT JOIN grape_types g ON g.id = p.grape_type_id
"#;

// ============================================================================
// Reads
// ============================================================================

#[async_trait]
impl Storage for PgStorage {
    async fn begin(&self) -> AppResult<Box<dyn StorageTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgStorageTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_parcel(&self, id: Uuid) -> AppResult<Option<Parcel>> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            SELECT id, name, location_description, longitude, latitude, status,
                   created_at, updated_at
            FROM parcels
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Parcel::try_from).transpose()
    }

    async fn list_parcels(&self) -> AppResult<Vec<Parcel>> {
        let rows = sqlx::query_as::<_, ParcelRow>(
            r#"
            SELECT id, name, location_description, longitude, latitude, status,
                   created_at, updated_at
            FROM parcels
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        collect_parcels(rows)
    }

    async fn dimension_history(&self, parcel_id: Uuid) -> AppResult<Vec<DimensionRecord>> {
        let rows = sqlx::query_as::<_, DimensionRow>(
            r#"
            SELECT id, parcel_id, surface, length, width, slope, created_at
            FROM parcel_dimensions
            WHERE parcel_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(parcel_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn all_dimensions(&self) -> AppResult<Vec<DimensionRecord>> {
        let rows = sqlx::query_as::<_, DimensionRow>(
            r#"
            SELECT id, parcel_id, surface, length, width, slope, created_at
            FROM parcel_dimensions
            ORDER BY parcel_id, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest_dimensions(&self) -> AppResult<Vec<DimensionRecord>> {
        let rows = sqlx::query_as::<_, DimensionRow>(
            r#"
            SELECT DISTINCT ON (parcel_id)
                   id, parcel_id, surface, length, width, slope, created_at
            FROM parcel_dimensions
            ORDER BY parcel_id, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn soil_control_history(&self, parcel_id: Uuid) -> AppResult<Vec<SoilControlRecord>> {
        let rows = sqlx::query_as::<_, SoilControlRow>(
            r#"
            SELECT id, parcel_id, ph, humidity, temperature, observations, created_at
            FROM soil_controls
            WHERE parcel_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(parcel_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest_soil_controls(&self) -> AppResult<Vec<SoilControlRecord>> {
        let rows = sqlx::query_as::<_, SoilControlRow>(
            r#"
            SELECT DISTINCT ON (parcel_id)
                   id, parcel_id, ph, humidity, temperature, observations, created_at
            FROM soil_controls
            ORDER BY parcel_id, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_planting(&self, id: Uuid) -> AppResult<Option<PlantingView>> {
        let sql = format!("{} WHERE p.id = $1", PLANTING_VIEW_SELECT);
        let row = sqlx::query_as::<_, PlantingViewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(PlantingView::try_from).transpose()
    }

    async fn planting_history(&self, parcel_id: Uuid) -> AppResult<Vec<PlantingView>> {
        let sql = format!(
            "{} WHERE p.parcel_id = $1 ORDER BY p.created_at DESC",
            PLANTING_VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, PlantingViewRow>(&sql)
            .bind(parcel_id)
            .fetch_all(&self.db)
            .await?;

        collect_views(rows)
    }

    async fn all_plantings(&self) -> AppResult<Vec<PlantingView>> {
        let sql = format!(
            "{} ORDER BY p.parcel_id, p.created_at DESC",
            PLANTING_VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, PlantingViewRow>(&sql)
            .fetch_all(&self.db)
            .await?;

        collect_views(rows)
    }

    async fn get_grape_type(&self, id: Uuid) -> AppResult<Option<GrapeType>> {
        let row = sqlx::query_as::<_, GrapeTypeRow>(
            r#"
            SELECT id, name, description, ph_min, ph_max, humidity_min, humidity_max,
                   temperature_min, temperature_max, harvest_duration_days,
                   created_at, updated_at
            FROM grape_types
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_grape_types(&self) -> AppResult<Vec<GrapeType>> {
        let rows = sqlx::query_as::<_, GrapeTypeRow>(
            r#"
            SELECT id, name, description, ph_min, ph_max, humidity_min, humidity_max,
                   temperature_min, temperature_max, harvest_duration_days,
                   created_at, updated_at
            FROM grape_types
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn grape_type_parcels(&self) -> AppResult<Vec<(Uuid, ParcelRef)>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String)>(
            r#"
            SELECT DISTINCT s.grape_type_id, p.id, p.name
            FROM plantings s
            JOIN parcels p ON p.id = s.parcel_id
            WHERE s.grape_type_id IS NOT NULL
            ORDER BY s.grape_type_id, p.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(grape_type_id, id, name)| (grape_type_id, ParcelRef { id, name }))
            .collect())
    }

    async fn find_account(&self, identifier: &str) -> AppResult<Option<AccountCredentials>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT a.id, a.identifier, a.password_hash, a.first_name, a.last_name, a.email,
                   a.enabled, a.created_at,
                   COALESCE(ARRAY_AGG(ar.role_id ORDER BY ar.role_id)
                            FILTER (WHERE ar.role_id IS NOT NULL), '{}') AS roles
            FROM accounts a
            LEFT JOIN account_roles ar ON ar.account_id = a.id
            WHERE a.identifier = $1
            GROUP BY a.id
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|row| AccountCredentials {
            password_hash: row.password_hash,
            account: Account {
                id: row.id,
                identifier: row.identifier,
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                enabled: row.enabled,
                roles: row.roles,
                created_at: row.created_at,
            },
        }))
    }
}

// ============================================================================
// Transactional writes
// ============================================================================

#[async_trait]
impl StorageTx for PgStorageTx {
    async fn lock_parcel(&mut self, parcel_id: Uuid) -> AppResult<Option<ParcelSnapshot>> {
        // Row lock serializes every prerequisite check on this parcel
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM parcels WHERE id = $1 FOR UPDATE")
            .bind(parcel_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        if locked.is_none() {
            return Ok(None);
        }

        let (dimension_count, soil_control_count, active_planting_count, has_grape_type) =
            sqlx::query_as::<_, (i64, i64, i64, bool)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM parcel_dimensions WHERE parcel_id = $1),
                    (SELECT COUNT(*) FROM soil_controls WHERE parcel_id = $1),
                    (SELECT COUNT(*) FROM plantings WHERE parcel_id = $1 AND state = 'active'),
                    EXISTS (
                        SELECT 1 FROM plantings
                        WHERE parcel_id = $1 AND state = 'active' AND grape_type_id IS NOT NULL
                    )
                "#,
            )
            .bind(parcel_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(Some(ParcelSnapshot {
            dimension_count,
            soil_control_count,
            active_planting_count,
            active_planting_has_grape_type: has_grape_type,
        }))
    }

    async fn fetch_parcel(&mut self, parcel_id: Uuid) -> AppResult<Option<Parcel>> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            SELECT id, name, location_description, longitude, latitude, status,
                   created_at, updated_at
            FROM parcels
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(parcel_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Parcel::try_from).transpose()
    }

    async fn parcel_name_taken(&mut self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM parcels
            WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count > 0)
    }

    async fn insert_parcel(&mut self, parcel: &NewParcel) -> AppResult<Parcel> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            INSERT INTO parcels (name, location_description, longitude, latitude, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, location_description, longitude, latitude, status,
                      created_at, updated_at
            "#,
        )
        .bind(parcel.name.trim())
        .bind(&parcel.location_description)
        .bind(parcel.coordinates.longitude)
        .bind(parcel.coordinates.latitude)
        .bind(parcel.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_parcel(&mut self, parcel: &Parcel) -> AppResult<Parcel> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            UPDATE parcels
            SET name = $1, location_description = $2, longitude = $3, latitude = $4,
                status = $5, updated_at = NOW()
            WHERE id = $6
            RETURNING id, name, location_description, longitude, latitude, status,
                      created_at, updated_at
            "#,
        )
        .bind(parcel.name.trim())
        .bind(&parcel.location_description)
        .bind(parcel.coordinates.longitude)
        .bind(parcel.coordinates.latitude)
        .bind(parcel.status.as_str())
        .bind(parcel.id)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn insert_dimensions(
        &mut self,
        parcel_id: Uuid,
        dimensions: &Dimensions,
    ) -> AppResult<DimensionRecord> {
        let row = sqlx::query_as::<_, DimensionRow>(
            r#"
            INSERT INTO parcel_dimensions (parcel_id, surface, length, width, slope)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, parcel_id, surface, length, width, slope, created_at
            "#,
        )
        .bind(parcel_id)
        .bind(dimensions.surface)
        .bind(dimensions.length)
        .bind(dimensions.width)
        .bind(dimensions.slope)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn insert_soil_control(
        &mut self,
        parcel_id: Uuid,
        reading: &SoilReading,
    ) -> AppResult<SoilControlRecord> {
        let row = sqlx::query_as::<_, SoilControlRow>(
            r#"
            INSERT INTO soil_controls (parcel_id, ph, humidity, temperature, observations)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, parcel_id, ph, humidity, temperature, observations, created_at
            "#,
        )
        .bind(parcel_id)
        .bind(reading.ph)
        .bind(reading.humidity)
        .bind(reading.temperature)
        .bind(&reading.observations)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn fetch_grape_type(&mut self, id: Uuid) -> AppResult<Option<GrapeType>> {
        let row = sqlx::query_as::<_, GrapeTypeRow>(
            r#"
            SELECT id, name, description, ph_min, ph_max, humidity_min, humidity_max,
                   temperature_min, temperature_max, harvest_duration_days,
                   created_at, updated_at
            FROM grape_types
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn lock_grape_type(&mut self, id: Uuid) -> AppResult<Option<GrapeType>> {
        // NO KEY UPDATE leaves the key-share locks taken by planting foreign
        // keys unblocked
        let row = sqlx::query_as::<_, GrapeTypeRow>(
            r#"
            SELECT id, name, description, ph_min, ph_max, humidity_min, humidity_max,
                   temperature_min, temperature_max, harvest_duration_days,
                   created_at, updated_at
            FROM grape_types
            WHERE id = $1
            FOR NO KEY UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn grape_type_name_taken(
        &mut self,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM grape_types
            WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count > 0)
    }

    async fn insert_grape_type(&mut self, grape_type: &NewGrapeType) -> AppResult<GrapeType> {
        let requirements = &grape_type.requirements;
        let row = sqlx::query_as::<_, GrapeTypeRow>(
            r#"
            INSERT INTO grape_types (name, description, ph_min, ph_max, humidity_min,
                                     humidity_max, temperature_min, temperature_max,
                                     harvest_duration_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, description, ph_min, ph_max, humidity_min, humidity_max,
                      temperature_min, temperature_max, harvest_duration_days,
                      created_at, updated_at
            "#,
        )
        .bind(grape_type.name.trim())
        .bind(&grape_type.description)
        .bind(requirements.ph.min)
        .bind(requirements.ph.max)
        .bind(requirements.humidity.min)
        .bind(requirements.humidity.max)
        .bind(requirements.temperature.min)
        .bind(requirements.temperature.max)
        .bind(requirements.harvest_duration_days)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn update_grape_type(&mut self, grape_type: &GrapeType) -> AppResult<GrapeType> {
        let requirements = &grape_type.requirements;
        let row = sqlx::query_as::<_, GrapeTypeRow>(
            r#"
            UPDATE grape_types
            SET name = $1, description = $2, ph_min = $3, ph_max = $4, humidity_min = $5,
                humidity_max = $6, temperature_min = $7, temperature_max = $8,
                harvest_duration_days = $9, updated_at = NOW()
            WHERE id = $10
            RETURNING id, name, description, ph_min, ph_max, humidity_min, humidity_max,
                      temperature_min, temperature_max, harvest_duration_days,
                      created_at, updated_at
            "#,
        )
        .bind(grape_type.name.trim())
        .bind(&grape_type.description)
        .bind(requirements.ph.min)
        .bind(requirements.ph.max)
        .bind(requirements.humidity.min)
        .bind(requirements.humidity.max)
        .bind(requirements.temperature.min)
        .bind(requirements.temperature.max)
        .bind(requirements.harvest_duration_days)
        .bind(grape_type.id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn fetch_planting(&mut self, id: Uuid) -> AppResult<Option<Planting>> {
        let row = sqlx::query_as::<_, PlantingRow>(
            r#"
            SELECT id, parcel_id, grape_type_id, technique, planting_date, plant_count,
                   observations, state, created_at, updated_at
            FROM plantings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Planting::try_from).transpose()
    }

    async fn active_planting(&mut self, parcel_id: Uuid) -> AppResult<Option<Planting>> {
        let row = sqlx::query_as::<_, PlantingRow>(
            r#"
            SELECT id, parcel_id, grape_type_id, technique, planting_date, plant_count,
                   observations, state, created_at, updated_at
            FROM plantings
            WHERE parcel_id = $1 AND state = 'active'
            "#,
        )
        .bind(parcel_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Planting::try_from).transpose()
    }

    async fn insert_planting(&mut self, planting: &NewPlanting) -> AppResult<Planting> {
        let row = sqlx::query_as::<_, PlantingRow>(
            r#"
            INSERT INTO plantings (parcel_id, grape_type_id, technique, planting_date,
                                   plant_count, observations, state)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING id, parcel_id, grape_type_id, technique, planting_date, plant_count,
                      observations, state, created_at, updated_at
            "#,
        )
        .bind(planting.parcel_id)
        .bind(planting.grape_type_id)
        .bind(planting.technique.trim())
        .bind(planting.planting_date)
        .bind(planting.plant_count)
        .bind(&planting.observations)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_planting(&mut self, planting: &Planting) -> AppResult<Planting> {
        let row = sqlx::query_as::<_, PlantingRow>(
            r#"
            UPDATE plantings
            SET grape_type_id = $1, technique = $2, planting_date = $3, plant_count = $4,
                observations = $5, state = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING id, parcel_id, grape_type_id, technique, planting_date, plant_count,
                      observations, state, created_at, updated_at
            "#,
        )
        .bind(planting.grape_type_id)
        .bind(planting.technique.trim())
        .bind(planting.planting_date)
        .bind(planting.plant_count)
        .bind(&planting.observations)
        .bind(planting.state.as_str())
        .bind(planting.id)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn account_exists(&mut self, identifier: &str, email: &str) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM accounts WHERE identifier = $1 OR LOWER(email) = LOWER($2)",
        )
        .bind(identifier)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count > 0)
    }

    async fn unknown_roles(&mut self, roles: &[i32]) -> AppResult<Vec<i32>> {
        let known = sqlx::query_scalar::<_, i32>("SELECT id FROM roles WHERE id = ANY($1)")
            .bind(roles)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(roles
            .iter()
            .copied()
            .filter(|role| !known.contains(role))
            .collect())
    }

    async fn insert_account(&mut self, account: &NewAccount) -> AppResult<Account> {
        let (id, enabled, created_at) = sqlx::query_as::<_, (Uuid, bool, DateTime<Utc>)>(
            r#"
            INSERT INTO accounts (identifier, password_hash, first_name, last_name, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, enabled, created_at
            "#,
        )
        .bind(&account.identifier)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .fetch_one(&mut *self.tx)
        .await?;

        for role_id in &account.roles {
            sqlx::query("INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2)")
                .bind(id)
                .bind(role_id)
                .execute(&mut *self.tx)
                .await?;
        }

        Ok(Account {
            id,
            identifier: account.identifier.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            email: account.email.clone(),
            enabled,
            roles: account.roles.clone(),
            created_at,
        })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
