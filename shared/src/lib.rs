//! Shared types and models for the Meadery inventory system
//!
//! This crate holds the domain vocabulary used by the backend services and by
//! any presentation layer built on top of them: entities, tagged enums,
//! fixed-point unit helpers and pure validation rules.

pub mod models;
pub mod types;
pub mod units;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
