//! Domain models for the Vineyard Management Platform

mod account;
mod dimension;
mod grape_type;
mod parcel;
mod planting;
mod soil_control;

pub use account::*;
pub use dimension::*;
pub use grape_type::*;
pub use parcel::*;
pub use planting::*;
pub use soil_control::*;
