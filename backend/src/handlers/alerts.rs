//! HTTP handlers for stock alert endpoints

use axum::{extract::State, http::StatusCode, Json};
use shared::{PaginatedResponse, StockAlert};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::alerts::{AlertQuery, AlertService, AlertView, CreateAlertInput};
use crate::AppState;

fn service(state: &AppState) -> AlertService {
    AlertService::new(state.store.clone(), state.notifier.clone())
}

/// List the caller's stock alerts
pub async fn list_stock_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<AlertQuery>,
) -> AppResult<Json<PaginatedResponse<AlertView>>> {
    let alerts = service(&state).list(current_user.id(), query).await?;
    Ok(Json(alerts))
}

/// Create a stock alert by hand
pub async fn create_stock_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateAlertInput>,
) -> AppResult<(StatusCode, Json<StockAlert>)> {
    let alert = service(&state).create(current_user.id(), input).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// Dismiss an active stock alert
pub async fn dismiss_stock_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(alert_id): AppPath<Uuid>,
) -> AppResult<Json<StockAlert>> {
    let alert = service(&state).dismiss(current_user.id(), alert_id).await?;
    Ok(Json(alert))
}

/// Mark a stock alert as read
pub async fn mark_stock_alert_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(alert_id): AppPath<Uuid>,
) -> AppResult<Json<StockAlert>> {
    let alert = service(&state)
        .mark_read(current_user.id(), alert_id)
        .await?;
    Ok(Json(alert))
}
