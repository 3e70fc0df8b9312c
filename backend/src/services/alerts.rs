//! Low-stock alert engine and alert management

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{
    action_after_decrease, action_after_increase, AlertAction, AlertStatus, PaginatedResponse,
    Pagination, Product, ProductSummary, StockAlert,
};
use uuid::Uuid;

use super::notification::{EventName, Notifier};
use crate::error::{AppError, AppResult};
use crate::store::{AlertFilter, ProductRepository, StockAlertRepository, Store, StoreTx};

/// Alert changes produced by one evaluation
#[derive(Debug, Default)]
pub struct AlertChanges {
    pub raised: Option<StockAlert>,
    pub dismissed: Vec<StockAlert>,
}

impl AlertChanges {
    pub async fn publish(&self, notifier: &Notifier, owner: Uuid) {
        if let Some(alert) = &self.raised {
            notifier
                .publish(EventName::StockAlertCreated, owner, alert)
                .await;
        }
        for alert in &self.dismissed {
            notifier
                .publish(EventName::StockAlertUpdated, owner, alert)
                .await;
        }
    }
}

/// Raise an alert when the product sits at or below its reorder level and
/// has no active alert yet
pub async fn evaluate_after_decrease<T>(
    tx: &mut T,
    product: &Product,
) -> AppResult<Option<StockAlert>>
where
    T: StockAlertRepository + ?Sized,
{
    let active = tx.find_active_alert(product.user_id, product.id).await?;
    if action_after_decrease(product.quantity, product.reorder_level, active.is_some())
        != AlertAction::Raise
    {
        return Ok(None);
    }

    let raised = tx.insert_alert(&StockAlert::raise(product)).await?;
    if let Some(alert) = &raised {
        tracing::info!(
            product_id = %product.id,
            quantity = product.quantity,
            reorder_level = product.reorder_level,
            alert_id = %alert.id,
            "low stock alert raised"
        );
    }
    Ok(raised)
}

/// Dismiss all active alerts once the product is back above its reorder level
pub async fn evaluate_after_increase<T>(tx: &mut T, product: &Product) -> AppResult<Vec<StockAlert>>
where
    T: StockAlertRepository + ?Sized,
{
    if action_after_increase(product.quantity, product.reorder_level) != AlertAction::DismissActive {
        return Ok(Vec::new());
    }

    let dismissed = tx
        .dismiss_active_alerts(product.user_id, product.id)
        .await?;
    if !dismissed.is_empty() {
        tracing::info!(
            product_id = %product.id,
            quantity = product.quantity,
            count = dismissed.len(),
            "low stock alerts dismissed"
        );
    }
    Ok(dismissed)
}

/// Bring alerts in line with the product's current state after an edit
pub async fn reconcile<T>(tx: &mut T, product: &Product) -> AppResult<AlertChanges>
where
    T: StockAlertRepository + ?Sized,
{
    if product.is_low_stock() {
        Ok(AlertChanges {
            raised: evaluate_after_decrease(tx, product).await?,
            dismissed: Vec::new(),
        })
    } else {
        Ok(AlertChanges {
            raised: None,
            dismissed: evaluate_after_increase(tx, product).await?,
        })
    }
}

/// Query parameters for listing alerts
#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub status: Option<AlertStatus>,
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Input for creating an alert by hand
#[derive(Debug, Deserialize)]
pub struct CreateAlertInput {
    pub product_id: Option<Uuid>,
}

/// An alert with its product resolved for display
#[derive(Debug, Clone, Serialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: StockAlert,
    pub product: Option<ProductSummary>,
}

/// Alert management service
#[derive(Clone)]
pub struct AlertService {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl AlertService {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// List the caller's alerts, newest first
    pub async fn list(
        &self,
        owner: Uuid,
        query: AlertQuery,
    ) -> AppResult<PaginatedResponse<AlertView>> {
        let page = Pagination::from_query(query.page, query.limit);
        let filter = AlertFilter {
            status: query.status,
            unread_only: query.unread_only,
        };

        let mut tx = self.store.begin().await?;
        let (alerts, total) = tx.list_alerts(owner, &filter, page).await?;
        let ids: Vec<Uuid> = alerts.iter().map(|a| a.product_id).collect();
        let products = tx.product_summaries(owner, &ids).await?;

        Ok(PaginatedResponse::new(alerts, total, page).map(|alert| AlertView {
            product: products.get(&alert.product_id).cloned(),
            alert,
        }))
    }

    /// Raise an alert from the product's current quantity and reorder level
    pub async fn create(&self, owner: Uuid, input: CreateAlertInput) -> AppResult<StockAlert> {
        let product_id = input
            .product_id
            .ok_or_else(|| AppError::MissingField("product_id".to_string()))?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .find_product(owner, product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let conflict = || AppError::Conflict {
            resource: "stock_alert".to_string(),
            message: "Stock alert already exists for this product".to_string(),
        };
        if tx.find_active_alert(owner, product_id).await?.is_some() {
            return Err(conflict());
        }
        let alert = tx
            .insert_alert(&StockAlert::raise(&product))
            .await?
            .ok_or_else(conflict)?;
        tx.commit().await?;

        tracing::info!(alert_id = %alert.id, product_id = %product_id, "stock alert created");
        self.notifier
            .publish(EventName::StockAlertCreated, owner, &alert)
            .await;
        Ok(alert)
    }

    /// Dismiss one of the caller's active alerts
    pub async fn dismiss(&self, owner: Uuid, alert_id: Uuid) -> AppResult<StockAlert> {
        let mut tx = self.store.begin().await?;
        let alert = tx
            .dismiss_alert(owner, alert_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Active stock alert".to_string()))?;
        tx.commit().await?;

        tracing::info!(alert_id = %alert_id, "stock alert dismissed");
        self.notifier
            .publish(EventName::StockAlertUpdated, owner, &alert)
            .await;
        Ok(alert)
    }

    /// Mark one of the caller's alerts as read, whatever its status
    pub async fn mark_read(&self, owner: Uuid, alert_id: Uuid) -> AppResult<StockAlert> {
        let mut tx = self.store.begin().await?;
        let alert = tx
            .mark_alert_read(owner, alert_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock alert".to_string()))?;
        tx.commit().await?;

        self.notifier
            .publish(EventName::StockAlertRead, owner, &alert)
            .await;
        Ok(alert)
    }
}
