//! Stock ledger models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Direction of a quantity change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "in",
            StockDirection::Out => "out",
        }
    }
}

impl fmt::Display for StockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(StockDirection::In),
            "out" => Ok(StockDirection::Out),
            other => Err(ParseEnumError::new("stock direction", other)),
        }
    }
}

/// Sortable statement columns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovementSort {
    #[default]
    CreatedAt,
    Quantity,
}

impl MovementSort {
    pub fn column(&self) -> &'static str {
        match self {
            MovementSort::CreatedAt => "created_at",
            MovementSort::Quantity => "quantity",
        }
    }
}

/// An immutable ledger entry recording one quantity change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockMovement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub direction: StockDirection,
    /// Absolute size of the change, always positive
    pub quantity: i64,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        user_id: Uuid,
        product_id: Uuid,
        direction: StockDirection,
        quantity: i64,
        note: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            direction,
            quantity,
            note,
            created_at: Utc::now(),
        }
    }

    /// Signed effect of this entry on the product quantity
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            StockDirection::In => self.quantity,
            StockDirection::Out => -self.quantity,
        }
    }
}

pub fn sale_note(product_name: &str, quantity: i64) -> String {
    format!("Sold {} unit(s) of {}.", quantity, product_name)
}

pub fn restock_note(product_name: &str, quantity: i64) -> String {
    format!("Restocked {} unit(s) of {}.", quantity, product_name)
}

pub fn opening_stock_note(product_name: &str, quantity: i64) -> String {
    format!("Opening stock of {} unit(s) for {}.", quantity, product_name)
}

pub fn adjustment_note(product_name: &str, from: i64, to: i64) -> String {
    format!("Adjusted quantity of {} from {} to {}.", product_name, from, to)
}
