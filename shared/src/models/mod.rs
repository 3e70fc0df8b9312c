//! Domain models for the Inventory Manager

mod alert;
mod customer;
mod product;
mod sale;
mod stock;

pub use alert::*;
pub use customer::*;
pub use product::*;
pub use sale::*;
pub use stock::*;

use thiserror::Error;

/// Returned when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
