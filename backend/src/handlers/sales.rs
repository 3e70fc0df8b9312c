//! HTTP handlers for sale endpoints

use axum::{extract::State, http::StatusCode, Json};
use shared::{PaginatedResponse, SaleDetails};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sale::{RecordSaleInput, SaleQuery, SaleService};
use crate::AppState;

fn service(state: &AppState) -> SaleService {
    SaleService::new(state.store.clone(), state.notifier.clone())
}

/// Record a sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<RecordSaleInput>,
) -> AppResult<(StatusCode, Json<SaleDetails>)> {
    let sale = service(&state)
        .record_sale(current_user.id(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// List the caller's sales
pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<SaleQuery>,
) -> AppResult<Json<PaginatedResponse<SaleDetails>>> {
    let sales = service(&state).list(current_user.id(), query).await?;
    Ok(Json(sales))
}

/// Get a sale
pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(sale_id): AppPath<Uuid>,
) -> AppResult<Json<SaleDetails>> {
    let sale = service(&state).get(current_user.id(), sale_id).await?;
    Ok(Json(sale))
}
