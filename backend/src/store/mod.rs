//! Persistence boundary for the Inventory Manager
//!
//! Services talk to the datastore only through these traits. Every unit of
//! work runs inside a [`StoreTx`]: changes become visible on [`StoreTx::commit`]
//! and are discarded when the transaction is dropped without committing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    AlertStatus, Customer, DateRange, MovementSort, OwnerSummary, Pagination, Product, ProductSort,
    ProductSummary, Sale, SaleSort, SortOrder, StockAlert, StockDirection, StockMovement,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Product listing filters
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive match on name or SKU
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub sort: ProductSort,
    pub order: SortOrder,
}

/// Stock statement filters
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub direction: Option<StockDirection>,
    pub range: DateRange,
    /// Case-insensitive match on the product's name or SKU
    pub search: Option<String>,
    pub sort: MovementSort,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub unread_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    /// Only sales whose `sale_date` falls on this UTC day
    pub date: Option<NaiveDate>,
    /// Case-insensitive match on the denormalized contact fields
    pub search: Option<String>,
    pub sort: SaleSort,
    pub order: SortOrder,
}

#[async_trait]
pub trait ProductRepository: Send {
    async fn find_product(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Product>>;

    /// Like `find_product`, but holds the row until the transaction ends so
    /// concurrent stock changes wait for this one
    async fn find_product_for_update(
        &mut self,
        owner: Uuid,
        id: Uuid,
    ) -> AppResult<Option<Product>>;

    /// SKUs are unique across all owners
    async fn find_product_by_sku(&mut self, sku: &str) -> AppResult<Option<Product>>;

    async fn category_exists(&mut self, id: Uuid) -> AppResult<bool>;

    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;

    async fn update_product(&mut self, product: &Product) -> AppResult<()>;

    /// Remove a product and its alerts; returns false when nothing matched
    async fn delete_product(&mut self, owner: Uuid, id: Uuid) -> AppResult<bool>;

    async fn list_products(
        &mut self,
        owner: Uuid,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Product>, u64)>;

    /// Atomically subtract `quantity` only if the current quantity covers it.
    ///
    /// Returns the updated product, or `None` when the product is missing or
    /// holds fewer than `quantity` units.
    async fn decrement_quantity(
        &mut self,
        owner: Uuid,
        id: Uuid,
        quantity: i64,
    ) -> AppResult<Option<Product>>;

    async fn increment_quantity(
        &mut self,
        owner: Uuid,
        id: Uuid,
        quantity: i64,
    ) -> AppResult<Option<Product>>;

    async fn product_summaries(
        &mut self,
        owner: Uuid,
        ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, ProductSummary>>;
}

/// Append-only ledger access
#[async_trait]
pub trait StockMovementRepository: Send {
    async fn append_movement(&mut self, movement: &StockMovement) -> AppResult<()>;

    async fn list_movements(
        &mut self,
        owner: Uuid,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockMovement>, u64)>;
}

#[async_trait]
pub trait StockAlertRepository: Send {
    async fn find_active_alert(
        &mut self,
        owner: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<StockAlert>>;

    /// Insert an alert unless an active one already exists for the same
    /// product and owner; returns `None` in that case.
    async fn insert_alert(&mut self, alert: &StockAlert) -> AppResult<Option<StockAlert>>;

    /// Dismiss every active alert for the product; returns the dismissed alerts
    async fn dismiss_active_alerts(
        &mut self,
        owner: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockAlert>>;

    /// Dismiss one active alert; `None` when it is missing, foreign or already dismissed
    async fn dismiss_alert(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<StockAlert>>;

    async fn mark_alert_read(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<StockAlert>>;

    async fn list_alerts(
        &mut self,
        owner: Uuid,
        filter: &AlertFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockAlert>, u64)>;
}

#[async_trait]
pub trait SaleRepository: Send {
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()>;

    async fn find_sale(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Sale>>;

    async fn list_sales(
        &mut self,
        owner: Uuid,
        filter: &SaleFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Sale>, u64)>;
}

#[async_trait]
pub trait CustomerRepository: Send {
    async fn find_customer(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Customer>>;
}

#[async_trait]
pub trait UserRepository: Send {
    async fn find_owner(&mut self, id: Uuid) -> AppResult<Option<OwnerSummary>>;
}

/// One unit of work against the datastore
#[async_trait]
pub trait StoreTx:
    ProductRepository
    + StockMovementRepository
    + StockAlertRepository
    + SaleRepository
    + CustomerRepository
    + UserRepository
    + Send
{
    async fn commit(&mut self) -> AppResult<()>;
}

/// Entry point shared by all requests
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// True when the datastore answers
    async fn ping(&self) -> bool;
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE patterns
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
