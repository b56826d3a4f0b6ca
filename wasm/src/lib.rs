//! WebAssembly module for the Vineyard Management Platform
//!
//! Provides client-side checks for:
//! - Dimension, soil-control and account form validation
//! - Parcel consistency guard previews
//! - Plant density and grape suitability

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    evaluate, validate_coordinates, validate_dimensions, validate_email, validate_password,
    validate_soil_reading, Dimensions, GeoPoint, GrapeRequirements, GuardAction, InvalidField,
    ParcelSnapshot, SoilReading,
};

/// Outcome of a client-side check, serialized for JavaScript
#[derive(Serialize)]
struct CheckResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_es: Option<String>,
}

impl CheckResult {
    fn passed() -> Self {
        Self {
            ok: true,
            field: None,
            message_en: None,
            message_es: None,
        }
    }

    fn from_field(result: Result<(), InvalidField>) -> Self {
        match result {
            Ok(()) => Self::passed(),
            Err(invalid) => Self {
                ok: false,
                field: Some(invalid.field),
                message_en: Some(invalid.message.to_string()),
                message_es: Some(invalid.message_es.to_string()),
            },
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    }
}

fn parse<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {} JSON: {}", what, e)))
}

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("vineyard-wasm ready"));
}

/// Validate a dimensions form; returns a JSON check result
#[wasm_bindgen]
pub fn check_dimensions(dimensions_json: &str) -> Result<String, JsValue> {
    let dimensions: Dimensions = parse(dimensions_json, "dimensions")?;
    Ok(CheckResult::from_field(validate_dimensions(&dimensions)).to_json())
}

/// Validate a soil-control form; returns a JSON check result
#[wasm_bindgen]
pub fn check_soil_reading(reading_json: &str) -> Result<String, JsValue> {
    let reading: SoilReading = parse(reading_json, "soil reading")?;
    Ok(CheckResult::from_field(validate_soil_reading(&reading)).to_json())
}

/// Validate a parcel's coordinates
#[wasm_bindgen]
pub fn check_coordinates(longitude: f64, latitude: f64) -> String {
    let point = GeoPoint::new(
        Decimal::try_from(longitude).unwrap_or(Decimal::MAX),
        Decimal::try_from(latitude).unwrap_or(Decimal::MAX),
    );
    CheckResult::from_field(validate_coordinates(&point)).to_json()
}

/// Validate the email and secret of an account form
#[wasm_bindgen]
pub fn check_account(email: &str, secret: &str) -> String {
    let result = validate_email(email).and_then(|()| validate_password(secret));
    CheckResult::from_field(result).to_json()
}

/// Preview whether the server would accept `action` (snake_case name) on a
/// parcel described by `snapshot_json`
#[wasm_bindgen]
pub fn preview_guard(snapshot_json: &str, action: &str) -> Result<String, JsValue> {
    let snapshot: ParcelSnapshot = parse(snapshot_json, "snapshot")?;
    let action: GuardAction = serde_json::from_value(serde_json::Value::String(action.to_string()))
        .map_err(|_| JsValue::from_str(&format!("Unknown guard action: {}", action)))?;

    let result = match evaluate(&snapshot, action) {
        Ok(()) => CheckResult::passed(),
        Err(violation) => CheckResult {
            ok: false,
            field: None,
            message_en: Some(violation.to_string()),
            message_es: Some(violation.message_es().to_string()),
        },
    };
    Ok(result.to_json())
}

/// Plants per square meter, rounded to four decimals
#[wasm_bindgen]
pub fn calculate_plant_density(plant_count: i32, surface: f64) -> f64 {
    let surface = Decimal::try_from(surface).unwrap_or(Decimal::ZERO);
    if surface <= Decimal::ZERO || plant_count <= 0 {
        return 0.0;
    }
    let density = (Decimal::from(plant_count) / surface)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    density.to_string().parse().unwrap_or(0.0)
}

/// Whether a soil reading falls inside a grape type's pH, humidity and
/// temperature ranges
#[wasm_bindgen]
pub fn soil_suits_grape(reading_json: &str, requirements_json: &str) -> Result<bool, JsValue> {
    let reading: SoilReading = parse(reading_json, "soil reading")?;
    let requirements: GrapeRequirements = parse(requirements_json, "requirements")?;

    Ok(requirements.ph.contains(reading.ph)
        && requirements.humidity.contains(reading.humidity)
        && requirements.temperature.contains(reading.temperature))
}
