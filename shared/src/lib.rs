//! Shared types and models for the Vineyard Management Platform
//!
//! This crate contains the domain types, validation rules, and the parcel
//! consistency guard shared between the backend and the browser (via WASM).

pub mod guard;
pub mod models;
pub mod types;
pub mod validation;

pub use guard::*;
pub use models::*;
pub use types::*;
pub use validation::*;
