//! HTTP request handlers

pub mod auth;
pub mod grape_type;
pub mod health;
pub mod ledger;
pub mod parcel;
pub mod planting;

pub use auth::*;
pub use grape_type::*;
pub use health::*;
pub use ledger::*;
pub use parcel::*;
pub use planting::*;
