//! Product catalogue models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked product owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Stock keeping unit, unique across the whole store
    pub sku: String,
    pub category_id: Option<Uuid>,
    pub quantity: i64,
    /// Quantity at or below which the product counts as low stock
    pub reorder_level: i64,
    pub price: Decimal,
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            sku: self.sku.clone(),
        }
    }
}

/// Display fields attached to sales, alerts and ledger entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
}

/// Sortable product columns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Name,
    Quantity,
    Price,
}

impl ProductSort {
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::CreatedAt => "created_at",
            ProductSort::Name => "name",
            ProductSort::Quantity => "quantity",
            ProductSort::Price => "price",
        }
    }
}
