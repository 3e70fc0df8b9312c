//! Shared types and models for the Inventory Manager
//!
//! This crate holds the domain models and pure business rules used by the
//! backend: alert lifecycle decisions, sale totals, ledger notes and input
//! validation.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
