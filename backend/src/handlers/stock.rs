//! HTTP handlers for stock statements

use axum::{extract::State, Json};
use shared::PaginatedResponse;

use super::extract::AppQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::{LedgerService, StatementQuery, StockStatement};
use crate::AppState;

/// Query the caller's stock ledger
pub async fn list_stock_statements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<StatementQuery>,
) -> AppResult<Json<PaginatedResponse<StockStatement>>> {
    let service = LedgerService::new(state.store.clone());
    let statements = service.list(current_user.id(), query).await?;
    Ok(Json(statements))
}
