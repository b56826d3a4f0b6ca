//! Validation utilities for the Vineyard Management Platform
//!
//! Range and shape rules applied to every write path. Each failure names the
//! offending field and carries English and Spanish messages.

use rust_decimal::Decimal;

use crate::models::{Dimensions, GrapeRequirements, SoilReading};
use crate::types::{GeoPoint, RequirementRange};

/// A rejected input field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidField {
    pub field: &'static str,
    pub message: &'static str,
    pub message_es: &'static str,
}

impl InvalidField {
    const fn new(field: &'static str, message: &'static str, message_es: &'static str) -> Self {
        Self {
            field,
            message,
            message_es,
        }
    }
}

impl std::fmt::Display for InvalidField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub type FieldResult = Result<(), InvalidField>;

pub const PH_MIN: Decimal = Decimal::ZERO;
pub const PH_MAX: Decimal = Decimal::from_parts(14, 0, 0, false, 0);
pub const PERCENT_MAX: Decimal = Decimal::ONE_HUNDRED;
pub const TEMPERATURE_MIN: Decimal = Decimal::from_parts(50, 0, 0, true, 0);
pub const TEMPERATURE_MAX: Decimal = Decimal::from_parts(70, 0, 0, false, 0);
pub const LONGITUDE_LIMIT: Decimal = Decimal::from_parts(180, 0, 0, false, 0);
pub const LATITUDE_LIMIT: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

// ============================================================================
// Parcel Validations
// ============================================================================

/// Validate a parcel or grape type name is not blank
pub fn validate_name(field: &'static str, name: &str) -> FieldResult {
    if name.trim().is_empty() {
        return Err(InvalidField::new(
            field,
            "Name cannot be empty",
            "El nombre no puede estar vacío",
        ));
    }
    Ok(())
}

/// Validate longitude ∈ [-180, 180] and latitude ∈ [-90, 90]
pub fn validate_coordinates(point: &GeoPoint) -> FieldResult {
    if point.longitude < -LONGITUDE_LIMIT || point.longitude > LONGITUDE_LIMIT {
        return Err(InvalidField::new(
            "longitude",
            "Longitude must be between -180 and 180",
            "La longitud debe estar entre -180 y 180",
        ));
    }
    if point.latitude < -LATITUDE_LIMIT || point.latitude > LATITUDE_LIMIT {
        return Err(InvalidField::new(
            "latitude",
            "Latitude must be between -90 and 90",
            "La latitud debe estar entre -90 y 90",
        ));
    }
    Ok(())
}

// ============================================================================
// Ledger Validations
// ============================================================================

/// Validate surface, length and width are positive and slope is 0-100
pub fn validate_dimensions(dimensions: &Dimensions) -> FieldResult {
    if dimensions.surface <= Decimal::ZERO {
        return Err(InvalidField::new(
            "surface",
            "Surface must be greater than 0",
            "La superficie debe ser mayor que 0",
        ));
    }
    if dimensions.length <= Decimal::ZERO {
        return Err(InvalidField::new(
            "length",
            "Length must be greater than 0",
            "La longitud debe ser mayor que 0",
        ));
    }
    if dimensions.width <= Decimal::ZERO {
        return Err(InvalidField::new(
            "width",
            "Width must be greater than 0",
            "La anchura debe ser mayor que 0",
        ));
    }
    if dimensions.slope < Decimal::ZERO || dimensions.slope > PERCENT_MAX {
        return Err(InvalidField::new(
            "slope",
            "Slope must be between 0 and 100",
            "La pendiente debe estar entre 0 y 100",
        ));
    }
    Ok(())
}

/// Validate pH is on the 0-14 scale
pub fn validate_ph(ph: Decimal) -> FieldResult {
    if ph < PH_MIN || ph > PH_MAX {
        return Err(InvalidField::new(
            "ph",
            "pH must be between 0 and 14",
            "El pH debe estar entre 0 y 14",
        ));
    }
    Ok(())
}

/// Validate a soil reading
pub fn validate_soil_reading(reading: &SoilReading) -> FieldResult {
    validate_ph(reading.ph)?;
    if reading.humidity < Decimal::ZERO || reading.humidity > PERCENT_MAX {
        return Err(InvalidField::new(
            "humidity",
            "Humidity must be between 0 and 100",
            "La humedad debe estar entre 0 y 100",
        ));
    }
    if reading.temperature < TEMPERATURE_MIN || reading.temperature > TEMPERATURE_MAX {
        return Err(InvalidField::new(
            "temperature",
            "Temperature must be between -50 and 70 °C",
            "La temperatura debe estar entre -50 y 70 °C",
        ));
    }
    Ok(())
}

// ============================================================================
// Catalog and Planting Validations
// ============================================================================

fn validate_range(
    field: &'static str,
    range: &RequirementRange,
    floor: Decimal,
    ceiling: Decimal,
) -> FieldResult {
    if range.min > range.max {
        return Err(InvalidField::new(
            field,
            "Requirement minimum cannot exceed its maximum",
            "El mínimo del requisito no puede superar su máximo",
        ));
    }
    if range.min < floor || range.max > ceiling {
        return Err(InvalidField::new(
            field,
            "Requirement range is outside the valid scale",
            "El rango del requisito está fuera de la escala válida",
        ));
    }
    Ok(())
}

/// Validate a cultivar's requirement ranges and harvest duration
pub fn validate_grape_requirements(requirements: &GrapeRequirements) -> FieldResult {
    validate_range("ph", &requirements.ph, PH_MIN, PH_MAX)?;
    validate_range("humidity", &requirements.humidity, Decimal::ZERO, PERCENT_MAX)?;
    validate_range(
        "temperature",
        &requirements.temperature,
        TEMPERATURE_MIN,
        TEMPERATURE_MAX,
    )?;
    if requirements.harvest_duration_days <= 0 {
        return Err(InvalidField::new(
            "harvest_duration_days",
            "Harvest duration must be greater than 0 days",
            "El tiempo de cosecha debe ser mayor que 0 días",
        ));
    }
    Ok(())
}

/// Validate plant count is positive
pub fn validate_plant_count(plant_count: i32) -> FieldResult {
    if plant_count <= 0 {
        return Err(InvalidField::new(
            "plant_count",
            "Plant count must be greater than 0",
            "La cantidad de plantas debe ser mayor que 0",
        ));
    }
    Ok(())
}

/// Validate the planting technique is not blank
pub fn validate_technique(technique: &str) -> FieldResult {
    if technique.trim().is_empty() {
        return Err(InvalidField::new(
            "technique",
            "Planting technique is required",
            "La técnica de siembra es obligatoria",
        ));
    }
    Ok(())
}

// ============================================================================
// Account Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> FieldResult {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err(InvalidField::new(
            "email",
            "Invalid email format",
            "Formato de correo inválido",
        ))
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> FieldResult {
    if password.len() < 8 {
        return Err(InvalidField::new(
            "secret",
            "Password must be at least 8 characters",
            "La contraseña debe tener al menos 8 caracteres",
        ));
    }
    Ok(())
}
