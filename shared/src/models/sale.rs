//! Sale models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CustomerSummary, OwnerSummary, ProductSummary};

/// One line of a sale; the unit price is a snapshot taken when the sale was recorded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleItem {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl SaleItem {
    /// Returns `None` when the line total does not fit in a `Decimal`
    pub fn priced(product_id: Uuid, quantity: i64, unit_price: Decimal) -> Option<Self> {
        let total = unit_price.checked_mul(Decimal::from(quantity))?;
        Some(Self {
            product_id,
            quantity,
            unit_price,
            total,
        })
    }
}

/// Sum of the line totals, or `None` on overflow
pub fn total_amount(items: &[SaleItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.total))
}

/// Sortable sale columns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleSort {
    #[default]
    CreatedAt,
    SaleDate,
    TotalAmount,
}

impl SaleSort {
    pub fn column(&self) -> &'static str {
        match self {
            SaleSort::CreatedAt => "created_at",
            SaleSort::SaleDate => "sale_date",
            SaleSort::TotalAmount => "total_amount",
        }
    }
}

/// Contact details denormalized onto a sale
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
}

impl CustomerContact {
    /// Merge explicit overrides on top of these details.
    ///
    /// An override wins when it is present and not blank.
    pub fn overridden_by(self, overrides: &CustomerContact) -> CustomerContact {
        fn pick(base: Option<String>, over: &Option<String>) -> Option<String> {
            match over {
                Some(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
                _ => base,
            }
        }

        CustomerContact {
            name: pick(self.name, &overrides.name),
            phone: pick(self.phone, &overrides.phone),
            email: pick(self.email, &overrides.email),
            address: pick(self.address, &overrides.address),
            note: pick(self.note, &overrides.note),
        }
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.name, &self.phone, &self.email, &self.address, &self.note]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// A recorded sale; immutable once persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_id: Option<Uuid>,
    #[serde(flatten)]
    pub contact: CustomerContact,
    pub items: Vec<SaleItem>,
    pub total_amount: Decimal,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A sale line with its product resolved for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleItemDetails {
    #[serde(flatten)]
    pub item: SaleItem,
    /// `None` when the product has since been deleted
    pub product: Option<ProductSummary>,
}

/// A sale with owner, customer and products resolved for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleDetails {
    pub id: Uuid,
    pub owner: OwnerSummary,
    pub customer: Option<CustomerSummary>,
    #[serde(flatten)]
    pub contact: CustomerContact,
    pub items: Vec<SaleItemDetails>,
    pub total_amount: Decimal,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SaleDetails {
    pub fn assemble(
        sale: Sale,
        owner: OwnerSummary,
        customer: Option<CustomerSummary>,
        products: &HashMap<Uuid, ProductSummary>,
    ) -> Self {
        let items = sale
            .items
            .into_iter()
            .map(|item| SaleItemDetails {
                product: products.get(&item.product_id).cloned(),
                item,
            })
            .collect();

        Self {
            id: sale.id,
            owner,
            customer,
            contact: sale.contact,
            items,
            total_amount: sale.total_amount,
            sale_date: sale.sale_date,
            created_at: sale.created_at,
        }
    }
}
