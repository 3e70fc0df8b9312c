//! Product catalogue service: CRUD and restocking

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    adjustment_note, normalize_search, opening_stock_note, restock_note, validate_money,
    validate_name, validate_non_negative, validate_positive_quantity, validate_sku,
    PaginatedResponse, Pagination, Product, ProductSort, SortOrder, StockDirection, MAX_QUANTITY,
};
use uuid::Uuid;

use super::alerts::{self, AlertChanges};
use super::ledger;
use super::notification::{EventName, Notifier};
use crate::error::{AppError, AppResult};
use crate::store::{ProductFilter, ProductRepository, Store, StoreTx};

/// Input for creating a product
#[derive(Debug, Default, Deserialize)]
pub struct CreateProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub quantity: Option<i64>,
    pub reorder_level: Option<i64>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
}

/// Input for updating a product; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub quantity: Option<i64>,
    pub reorder_level: Option<i64>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
}

/// Input for adding stock
#[derive(Debug, Deserialize)]
pub struct RestockInput {
    pub added_quantity: Option<i64>,
}

/// Query parameters for listing products
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub sort: ProductSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct DeletedProduct {
    id: Uuid,
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::MissingField(field.to_string()))
}

fn check(field: &str, result: Result<(), &'static str>) -> AppResult<()> {
    result.map_err(|message| AppError::invalid(field, message))
}

/// Product service
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Create a product, recording any opening stock in the ledger
    pub async fn create(&self, owner: Uuid, input: CreateProductInput) -> AppResult<Product> {
        let name = required(input.name, "name")?.trim().to_string();
        let sku = required(input.sku, "sku")?.trim().to_string();
        let quantity = required(input.quantity, "quantity")?;
        let reorder_level = required(input.reorder_level, "reorder_level")?;
        let price = required(input.price, "price")?;
        let cost = required(input.cost, "cost")?;

        check("name", validate_name(&name))?;
        check("sku", validate_sku(&sku))?;
        check("quantity", validate_non_negative(quantity))?;
        check("reorder_level", validate_non_negative(reorder_level))?;
        check("price", validate_money(price))?;
        check("cost", validate_money(cost))?;

        let mut tx = self.store.begin().await?;
        if let Some(category_id) = input.category_id {
            if !tx.category_exists(category_id).await? {
                return Err(AppError::NotFound("Category".to_string()));
            }
        }
        if tx.find_product_by_sku(&sku).await?.is_some() {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            user_id: owner,
            name,
            sku,
            category_id: input.category_id,
            quantity,
            reorder_level,
            price,
            cost,
            created_at: now,
            updated_at: now,
        };
        tx.insert_product(&product).await?;

        if product.quantity > 0 {
            let note = opening_stock_note(&product.name, product.quantity);
            ledger::record(&mut *tx, &product, StockDirection::In, product.quantity, note).await?;
        }
        let raised = alerts::evaluate_after_decrease(&mut *tx, &product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
        self.notifier
            .publish(EventName::ProductCreated, owner, &product)
            .await;
        AlertChanges {
            raised,
            dismissed: Vec::new(),
        }
        .publish(&self.notifier, owner)
        .await;

        Ok(product)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<Product> {
        let mut tx = self.store.begin().await?;
        tx.find_product(owner, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub async fn list(
        &self,
        owner: Uuid,
        query: ProductQuery,
    ) -> AppResult<PaginatedResponse<Product>> {
        let page = Pagination::from_query(query.page, query.limit);
        let filter = ProductFilter {
            search: normalize_search(query.search.as_deref()),
            category_id: query.category_id,
            sort: query.sort,
            order: query.order,
        };

        let mut tx = self.store.begin().await?;
        let (products, total) = tx.list_products(owner, &filter, page).await?;
        Ok(PaginatedResponse::new(products, total, page))
    }

    /// Apply a partial update.
    ///
    /// A new quantity is a manual correction: the difference goes to the
    /// ledger and alerts are brought in line with the new stock level.
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .find_product_for_update(owner, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        let previous_quantity = product.quantity;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            check("name", validate_name(&name))?;
            product.name = name;
        }
        if let Some(sku) = input.sku {
            let sku = sku.trim().to_string();
            check("sku", validate_sku(&sku))?;
            if sku != product.sku {
                let taken = tx
                    .find_product_by_sku(&sku)
                    .await?
                    .is_some_and(|other| other.id != product.id);
                if taken {
                    return Err(AppError::DuplicateEntry("sku".to_string()));
                }
                product.sku = sku;
            }
        }
        if let Some(category_id) = input.category_id {
            if !tx.category_exists(category_id).await? {
                return Err(AppError::NotFound("Category".to_string()));
            }
            product.category_id = Some(category_id);
        }
        if let Some(quantity) = input.quantity {
            check("quantity", validate_non_negative(quantity))?;
            product.quantity = quantity;
        }
        if let Some(reorder_level) = input.reorder_level {
            check("reorder_level", validate_non_negative(reorder_level))?;
            product.reorder_level = reorder_level;
        }
        if let Some(price) = input.price {
            check("price", validate_money(price))?;
            product.price = price;
        }
        if let Some(cost) = input.cost {
            check("cost", validate_money(cost))?;
            product.cost = cost;
        }
        product.updated_at = Utc::now();
        tx.update_product(&product).await?;

        let delta = product.quantity - previous_quantity;
        if delta != 0 {
            let direction = if delta > 0 {
                StockDirection::In
            } else {
                StockDirection::Out
            };
            let note = adjustment_note(&product.name, previous_quantity, product.quantity);
            ledger::record(&mut *tx, &product, direction, delta.abs(), note).await?;
        }
        let changes = alerts::reconcile(&mut *tx, &product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, quantity_delta = delta, "product updated");
        self.notifier
            .publish(EventName::ProductUpdated, owner, &product)
            .await;
        changes.publish(&self.notifier, owner).await;

        Ok(product)
    }

    /// Delete a product and its alerts; ledger entries and sales are kept
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_product(owner, id).await? {
            return Err(AppError::NotFound("Product".to_string()));
        }
        tx.commit().await?;

        tracing::info!(product_id = %id, "product deleted");
        self.notifier
            .publish(EventName::ProductDeleted, owner, &DeletedProduct { id })
            .await;
        Ok(())
    }

    /// Add stock to a product and dismiss its alerts once it is back above
    /// the reorder level
    pub async fn restock(&self, owner: Uuid, id: Uuid, added_quantity: i64) -> AppResult<Product> {
        check("added_quantity", validate_positive_quantity(added_quantity))?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .increment_quantity(owner, id, added_quantity)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        if product.quantity > MAX_QUANTITY {
            return Err(AppError::invalid(
                "added_quantity",
                "Restock would exceed the maximum stock level",
            ));
        }

        let note = restock_note(&product.name, added_quantity);
        ledger::record(&mut *tx, &product, StockDirection::In, added_quantity, note).await?;
        let dismissed = alerts::evaluate_after_increase(&mut *tx, &product).await?;
        tx.commit().await?;

        tracing::info!(
            product_id = %product.id,
            added_quantity,
            quantity = product.quantity,
            "product restocked"
        );
        self.notifier
            .publish(EventName::ProductRestocked, owner, &product)
            .await;
        AlertChanges {
            raised: None,
            dismissed,
        }
        .publish(&self.notifier, owner)
        .await;

        Ok(product)
    }
}
