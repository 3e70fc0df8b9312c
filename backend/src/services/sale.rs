//! Sale processing
//!
//! Recording a sale decrements stock, writes one ledger entry per line and
//! evaluates low-stock alerts, all inside a single transaction. Any failure
//! leaves the store exactly as it was before the call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    normalize_search, sale_note, total_amount, validate_email, validate_note,
    validate_positive_quantity, validate_sale_amount, CustomerContact, CustomerSummary,
    OwnerSummary, PaginatedResponse, Pagination, Product, ProductSummary, Sale, SaleDetails,
    SaleItem, SaleSort, SortOrder, StockAlert, StockDirection,
};
use uuid::Uuid;

use super::alerts;
use super::ledger;
use super::notification::{EventName, Notifier};
use crate::error::{AppError, AppResult};
use crate::store::{
    CustomerRepository, ProductRepository, SaleFilter, SaleRepository, Store, StoreTx,
    UserRepository,
};

/// One requested sale line
#[derive(Debug, Clone, Deserialize)]
pub struct SaleItemInput {
    pub product_id: Option<Uuid>,
    pub quantity: Option<i64>,
}

/// Input for recording a sale
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordSaleInput {
    pub customer_id: Option<Uuid>,
    /// Contact fields that win over the customer's own details when non-empty
    #[serde(flatten)]
    pub contact: CustomerContact,
    pub sale_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<SaleItemInput>,
}

/// Query parameters for listing sales
#[derive(Debug, Default, Deserialize)]
pub struct SaleQuery {
    pub date: Option<NaiveDate>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SaleSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A validated sale line
#[derive(Debug, Clone, Copy)]
struct SaleLine {
    product_id: Uuid,
    quantity: i64,
}

fn validate_lines(items: &[SaleItemInput]) -> AppResult<Vec<SaleLine>> {
    if items.is_empty() {
        return Err(AppError::MissingField("items".to_string()));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let product_id = item
                .product_id
                .ok_or_else(|| AppError::MissingField(format!("items[{}].product_id", index)))?;
            let quantity = item
                .quantity
                .ok_or_else(|| AppError::MissingField(format!("items[{}].quantity", index)))?;
            validate_positive_quantity(quantity)
                .map_err(|message| AppError::invalid(&format!("items[{}].quantity", index), message))?;
            Ok(SaleLine {
                product_id,
                quantity,
            })
        })
        .collect()
}

fn validate_contact(contact: &CustomerContact) -> AppResult<()> {
    if let Some(email) = contact.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email.trim()).map_err(|message| AppError::invalid("email", message))?;
    }
    if let Some(note) = contact.note.as_deref() {
        validate_note(note).map_err(|message| AppError::invalid("note", message))?;
    }
    Ok(())
}

/// Price one line at the product's current price
fn price_line(index: usize, product: &Product, line: SaleLine) -> AppResult<SaleItem> {
    SaleItem::priced(product.id, line.quantity, product.price)
        .filter(|item| validate_sale_amount(item.total).is_ok())
        .ok_or_else(|| {
            AppError::invalid(&format!("items[{}].quantity", index), "Line total is too large")
        })
}

fn sale_total(items: &[SaleItem]) -> AppResult<Decimal> {
    total_amount(items)
        .filter(|total| validate_sale_amount(*total).is_ok())
        .ok_or_else(|| AppError::invalid("items", "Sale total is too large"))
}

fn insufficient(product: &Product, requested: i64) -> AppError {
    AppError::InsufficientStock {
        product_id: product.id,
        product: product.name.clone(),
        requested,
        available: product.quantity,
    }
}

/// Decrement stock for one line, falling back to a re-read to explain a
/// refused decrement
async fn take_stock(
    tx: &mut dyn StoreTx,
    owner: Uuid,
    line: SaleLine,
) -> AppResult<Product> {
    if let Some(product) = tx
        .decrement_quantity(owner, line.product_id, line.quantity)
        .await?
    {
        return Ok(product);
    }

    match tx.find_product(owner, line.product_id).await? {
        Some(current) => Err(insufficient(&current, line.quantity)),
        None => Err(AppError::NotFound("Product".to_string())),
    }
}

/// Resolve owner, customer and product display data for a sale
async fn resolve_details(tx: &mut dyn StoreTx, sale: Sale) -> AppResult<SaleDetails> {
    let owner = tx
        .find_owner(sale.user_id)
        .await?
        .unwrap_or_else(|| OwnerSummary::unknown(sale.user_id));

    let customer: Option<CustomerSummary> = match sale.customer_id {
        Some(id) => tx
            .find_customer(sale.user_id, id)
            .await?
            .map(|c| c.summary()),
        None => None,
    };

    let ids: Vec<Uuid> = sale.items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, ProductSummary> = tx.product_summaries(sale.user_id, &ids).await?;

    Ok(SaleDetails::assemble(sale, owner, customer, &products))
}

/// Sale processing service
#[derive(Clone)]
pub struct SaleService {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl SaleService {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Record a multi-line sale.
    ///
    /// Lines are processed in input order. Each line checks stock, prices the
    /// line at the product's current price, decrements stock, writes an `out`
    /// ledger entry and evaluates alerts. The first failing line aborts the
    /// whole sale.
    pub async fn record_sale(&self, owner: Uuid, input: RecordSaleInput) -> AppResult<SaleDetails> {
        let lines = validate_lines(&input.items)?;
        validate_contact(&input.contact)?;

        let mut tx = self.store.begin().await?;

        let contact = match input.customer_id {
            Some(customer_id) => tx
                .find_customer(owner, customer_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Customer".to_string()))?
                .contact()
                .overridden_by(&input.contact),
            None => CustomerContact::default().overridden_by(&input.contact),
        };

        let mut items = Vec::with_capacity(lines.len());
        let mut raised: Vec<StockAlert> = Vec::new();
        let mut touched: Vec<Product> = Vec::new();

        for (index, line) in lines.into_iter().enumerate() {
            let product = tx
                .find_product(owner, line.product_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
            if line.quantity > product.quantity {
                return Err(insufficient(&product, line.quantity));
            }

            items.push(price_line(index, &product, line)?);

            let updated = take_stock(&mut *tx, owner, line).await?;
            let note = sale_note(&updated.name, line.quantity);
            ledger::record(&mut *tx, &updated, StockDirection::Out, line.quantity, note).await?;

            if let Some(alert) = alerts::evaluate_after_decrease(&mut *tx, &updated).await? {
                raised.push(alert);
            }
            touched.push(updated);
        }

        let total = sale_total(&items)?;
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            user_id: owner,
            customer_id: input.customer_id,
            contact,
            total_amount: total,
            items,
            sale_date: input.sale_date.unwrap_or(now),
            created_at: now,
        };
        tx.insert_sale(&sale).await?;
        let details = resolve_details(&mut *tx, sale).await?;
        tx.commit().await?;

        tracing::info!(
            sale_id = %details.id,
            lines = details.items.len(),
            total = %details.total_amount,
            alerts_raised = raised.len(),
            "sale recorded"
        );

        for alert in &raised {
            self.notifier
                .publish(EventName::StockAlertCreated, owner, alert)
                .await;
        }
        for product in touched.iter().filter(|p| raised.iter().any(|a| a.product_id == p.id)) {
            self.notifier
                .publish(EventName::ProductUpdated, owner, product)
                .await;
        }
        self.notifier
            .publish(EventName::SaleCreated, owner, &details)
            .await;

        Ok(details)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<SaleDetails> {
        let mut tx = self.store.begin().await?;
        let sale = tx
            .find_sale(owner, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;
        resolve_details(&mut *tx, sale).await
    }

    pub async fn list(
        &self,
        owner: Uuid,
        query: SaleQuery,
    ) -> AppResult<PaginatedResponse<SaleDetails>> {
        let page = Pagination::from_query(query.page, query.limit);
        let filter = SaleFilter {
            date: query.date,
            search: normalize_search(query.search.as_deref()),
            sort: query.sort,
            order: query.order,
        };

        let mut tx = self.store.begin().await?;
        let (sales, total) = tx.list_sales(owner, &filter, page).await?;

        let mut data = Vec::with_capacity(sales.len());
        for sale in sales {
            data.push(resolve_details(&mut *tx, sale).await?);
        }
        Ok(PaginatedResponse::new(data, total, page))
    }
}
