//! Stock ledger: append-only record of quantity changes

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    normalize_search, DateRange, MovementSort, PaginatedResponse, Pagination, Product,
    ProductSummary, SortOrder, StockDirection, StockMovement,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{MovementFilter, ProductRepository, StockMovementRepository, Store};

/// Append one ledger entry for a change to `product`
pub async fn record<T>(
    tx: &mut T,
    product: &Product,
    direction: StockDirection,
    quantity: i64,
    note: String,
) -> AppResult<StockMovement>
where
    T: StockMovementRepository + ?Sized,
{
    if quantity <= 0 {
        return Err(AppError::Internal(format!(
            "ledger quantity must be positive, got {}",
            quantity
        )));
    }

    let movement = StockMovement::new(product.user_id, product.id, direction, quantity, note);
    tx.append_movement(&movement).await?;
    tracing::debug!(
        product_id = %product.id,
        direction = %direction,
        quantity,
        "stock movement recorded"
    );
    Ok(movement)
}

/// Query parameters for stock statements
#[derive(Debug, Default, Deserialize)]
pub struct StatementQuery {
    pub product_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub direction: Option<StockDirection>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: MovementSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A ledger entry with its product resolved for display
#[derive(Debug, Clone, Serialize)]
pub struct StockStatement {
    #[serde(flatten)]
    pub movement: StockMovement,
    /// `None` once the product has been deleted
    pub product: Option<ProductSummary>,
}

/// Read access to the ledger
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        owner: Uuid,
        query: StatementQuery,
    ) -> AppResult<PaginatedResponse<StockStatement>> {
        let range = DateRange {
            from: query.from,
            to: query.to,
        };
        if range.is_inverted() {
            return Err(AppError::invalid("from", "`from` must not be after `to`"));
        }

        let page = Pagination::from_query(query.page, query.limit);
        let filter = MovementFilter {
            product_id: query.product_id,
            direction: query.direction,
            range,
            search: normalize_search(query.search.as_deref()),
            sort: query.sort,
            order: query.order,
        };

        let mut tx = self.store.begin().await?;
        let (movements, total) = tx.list_movements(owner, &filter, page).await?;
        let ids: Vec<Uuid> = movements.iter().map(|m| m.product_id).collect();
        let products = tx.product_summaries(owner, &ids).await?;

        Ok(PaginatedResponse::new(movements, total, page).map(|movement| StockStatement {
            product: products.get(&movement.product_id).cloned(),
            movement,
        }))
    }
}
