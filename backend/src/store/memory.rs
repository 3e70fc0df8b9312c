//! In-memory datastore
//!
//! Intended for tests and local runs. A transaction holds the store lock for
//! its whole lifetime and works on a private copy of the state; commit swaps
//! the copy in, dropping the transaction throws it away.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    AlertStatus, Customer, MovementSort, OwnerSummary, Pagination, Product, ProductSort,
    ProductSummary, Sale, SaleSort, SortOrder, StockAlert, StockMovement,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    AlertFilter, CustomerRepository, MovementFilter, ProductFilter, ProductRepository,
    SaleFilter, SaleRepository, StockAlertRepository, StockMovementRepository, Store, StoreTx,
    UserRepository,
};
use crate::error::{AppError, AppResult};

/// Everything the store holds
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub owners: HashMap<Uuid, OwnerSummary>,
    pub categories: HashSet<Uuid>,
    pub customers: HashMap<Uuid, Customer>,
    pub products: HashMap<Uuid, Product>,
    /// Kept in insertion order
    pub movements: Vec<StockMovement>,
    pub alerts: Vec<StockAlert>,
    pub sales: Vec<Sale>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_owner(&self, owner: OwnerSummary) {
        self.state.lock().await.owners.insert(owner.id, owner);
    }

    pub async fn seed_category(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.categories.insert(id);
        id
    }

    pub async fn seed_customer(&self, customer: Customer) {
        self.state.lock().await.customers.insert(customer.id, customer);
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T>(items: Vec<T>, page: Pagination) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let data = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    (data, total)
}

/// Stable sort; descending also reverses insertion order for ties
fn order_by<T>(items: &mut [T], order: SortOrder, compare: impl Fn(&T, &T) -> Ordering) {
    items.sort_by(|a, b| compare(a, b));
    if order == SortOrder::Desc {
        items.reverse();
    }
}

fn compare_movements(a: &StockMovement, b: &StockMovement, sort: MovementSort) -> Ordering {
    match sort {
        MovementSort::CreatedAt => a.created_at.cmp(&b.created_at),
        MovementSort::Quantity => a.quantity.cmp(&b.quantity),
    }
}

fn compare_sales(a: &Sale, b: &Sale, sort: SaleSort) -> Ordering {
    match sort {
        SaleSort::CreatedAt => a.created_at.cmp(&b.created_at),
        SaleSort::SaleDate => a.sale_date.cmp(&b.sale_date),
        SaleSort::TotalAmount => a.total_amount.cmp(&b.total_amount),
    }
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    match sort {
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        ProductSort::Quantity => a.quantity.cmp(&b.quantity),
        ProductSort::Price => a.price.cmp(&b.price),
    }
}

impl MemoryTx {
    fn sku_taken(&self, sku: &str, except: Uuid) -> bool {
        self.working
            .products
            .values()
            .any(|p| p.id != except && p.sku.eq_ignore_ascii_case(sku))
    }

    fn owned_product_mut(&mut self, owner: Uuid, id: Uuid) -> Option<&mut Product> {
        self.working
            .products
            .get_mut(&id)
            .filter(|p| p.user_id == owner)
    }

    fn owned_alert_mut(&mut self, owner: Uuid, id: Uuid) -> Option<&mut StockAlert> {
        self.working
            .alerts
            .iter_mut()
            .find(|a| a.id == id && a.user_id == owner)
    }
}

#[async_trait]
impl ProductRepository for MemoryTx {
    async fn find_product(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self
            .working
            .products
            .get(&id)
            .filter(|p| p.user_id == owner)
            .cloned())
    }

    async fn find_product_for_update(
        &mut self,
        owner: Uuid,
        id: Uuid,
    ) -> AppResult<Option<Product>> {
        self.find_product(owner, id).await
    }

    async fn find_product_by_sku(&mut self, sku: &str) -> AppResult<Option<Product>> {
        Ok(self
            .working
            .products
            .values()
            .find(|p| p.sku.eq_ignore_ascii_case(sku))
            .cloned())
    }

    async fn category_exists(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self.working.categories.contains(&id))
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        if self.sku_taken(&product.sku, product.id) {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        if self.sku_taken(&product.sku, product.id) {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }
        match self.owned_product_mut(product.user_id, product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Product".to_string())),
        }
    }

    async fn delete_product(&mut self, owner: Uuid, id: Uuid) -> AppResult<bool> {
        if self.owned_product_mut(owner, id).is_none() {
            return Ok(false);
        }
        self.working.products.remove(&id);
        self.working.alerts.retain(|a| a.product_id != id);
        Ok(true)
    }

    async fn list_products(
        &mut self,
        owner: Uuid,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut products: Vec<Product> = self
            .working
            .products
            .values()
            .filter(|p| p.user_id == owner)
            .filter(|p| filter.category_id.map_or(true, |c| p.category_id == Some(c)))
            .filter(|p| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |s| contains_ci(&p.name, s) || contains_ci(&p.sku, s))
            })
            .cloned()
            .collect();

        products.sort_by(|a, b| {
            let ord = compare_products(a, b, filter.sort).then_with(|| a.id.cmp(&b.id));
            match filter.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        Ok(paginate(products, page))
    }

    async fn decrement_quantity(
        &mut self,
        owner: Uuid,
        id: Uuid,
        quantity: i64,
    ) -> AppResult<Option<Product>> {
        Ok(self
            .owned_product_mut(owner, id)
            .filter(|p| p.quantity >= quantity)
            .map(|p| {
                p.quantity -= quantity;
                p.updated_at = Utc::now();
                p.clone()
            }))
    }

    async fn increment_quantity(
        &mut self,
        owner: Uuid,
        id: Uuid,
        quantity: i64,
    ) -> AppResult<Option<Product>> {
        let Some(product) = self.owned_product_mut(owner, id) else {
            return Ok(None);
        };
        product.quantity = product
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| AppError::invalid("added_quantity", "Quantity is out of range"))?;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn product_summaries(
        &mut self,
        owner: Uuid,
        ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, ProductSummary>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.products.get(id))
            .filter(|p| p.user_id == owner)
            .map(|p| (p.id, p.summary()))
            .collect())
    }
}

#[async_trait]
impl StockMovementRepository for MemoryTx {
    async fn append_movement(&mut self, movement: &StockMovement) -> AppResult<()> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn list_movements(
        &mut self,
        owner: Uuid,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockMovement>, u64)> {
        let products = &self.working.products;
        let mut movements: Vec<StockMovement> = self
            .working
            .movements
            .iter()
            .filter(|m| m.user_id == owner)
            .filter(|m| filter.product_id.map_or(true, |id| m.product_id == id))
            .filter(|m| filter.direction.map_or(true, |d| m.direction == d))
            .filter(|m| filter.range.contains(m.created_at))
            .filter(|m| {
                filter.search.as_deref().map_or(true, |s| {
                    products
                        .get(&m.product_id)
                        .is_some_and(|p| contains_ci(&p.name, s) || contains_ci(&p.sku, s))
                })
            })
            .cloned()
            .collect();

        order_by(&mut movements, filter.order, |a, b| {
            compare_movements(a, b, filter.sort)
        });
        Ok(paginate(movements, page))
    }
}

#[async_trait]
impl StockAlertRepository for MemoryTx {
    async fn find_active_alert(
        &mut self,
        owner: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<StockAlert>> {
        Ok(self
            .working
            .alerts
            .iter()
            .find(|a| a.user_id == owner && a.product_id == product_id && a.is_active())
            .cloned())
    }

    async fn insert_alert(&mut self, alert: &StockAlert) -> AppResult<Option<StockAlert>> {
        let clash = alert.is_active()
            && self.working.alerts.iter().any(|a| {
                a.user_id == alert.user_id && a.product_id == alert.product_id && a.is_active()
            });
        if clash {
            return Ok(None);
        }
        self.working.alerts.push(alert.clone());
        Ok(Some(alert.clone()))
    }

    async fn dismiss_active_alerts(
        &mut self,
        owner: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockAlert>> {
        let now = Utc::now();
        Ok(self
            .working
            .alerts
            .iter_mut()
            .filter(|a| a.user_id == owner && a.product_id == product_id && a.is_active())
            .map(|a| {
                a.status = AlertStatus::Dismissed;
                a.updated_at = now;
                a.clone()
            })
            .collect())
    }

    async fn dismiss_alert(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<StockAlert>> {
        Ok(self
            .owned_alert_mut(owner, id)
            .filter(|a| a.is_active())
            .map(|a| {
                a.status = AlertStatus::Dismissed;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn mark_alert_read(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<StockAlert>> {
        Ok(self.owned_alert_mut(owner, id).map(|a| {
            a.is_read = true;
            a.updated_at = Utc::now();
            a.clone()
        }))
    }

    async fn list_alerts(
        &mut self,
        owner: Uuid,
        filter: &AlertFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockAlert>, u64)> {
        let mut alerts: Vec<StockAlert> = self
            .working
            .alerts
            .iter()
            .filter(|a| a.user_id == owner)
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| !filter.unread_only || !a.is_read)
            .cloned()
            .collect();

        order_by(&mut alerts, SortOrder::Desc, |a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(alerts, page))
    }
}

#[async_trait]
impl SaleRepository for MemoryTx {
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        self.working.sales.push(sale.clone());
        Ok(())
    }

    async fn find_sale(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self
            .working
            .sales
            .iter()
            .find(|s| s.id == id && s.user_id == owner)
            .cloned())
    }

    async fn list_sales(
        &mut self,
        owner: Uuid,
        filter: &SaleFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Sale>, u64)> {
        let mut sales: Vec<Sale> = self
            .working
            .sales
            .iter()
            .filter(|s| s.user_id == owner)
            .filter(|s| filter.date.map_or(true, |d| s.sale_date.date_naive() == d))
            .filter(|s| filter.search.as_deref().map_or(true, |q| s.contact.matches(q)))
            .cloned()
            .collect();

        order_by(&mut sales, filter.order, |a, b| compare_sales(a, b, filter.sort));
        Ok(paginate(sales, page))
    }
}

#[async_trait]
impl CustomerRepository for MemoryTx {
    async fn find_customer(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self
            .working
            .customers
            .get(&id)
            .filter(|c| c.user_id == owner)
            .cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryTx {
    async fn find_owner(&mut self, id: Uuid) -> AppResult<Option<OwnerSummary>> {
        Ok(self.working.owners.get(&id).cloned())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(&mut self) -> AppResult<()> {
        *self.guard = self.working.clone();
        Ok(())
    }
}
