//! HTTP handlers for product endpoints

use axum::{extract::State, http::StatusCode, Json};
use shared::{PaginatedResponse, Product};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::product::{
    CreateProductInput, ProductQuery, ProductService, RestockInput, UpdateProductInput,
};
use crate::AppState;

fn service(state: &AppState) -> ProductService {
    ProductService::new(state.store.clone(), state.notifier.clone())
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = service(&state).create(current_user.id(), input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List the caller's products
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<ProductQuery>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    let products = service(&state).list(current_user.id(), query).await?;
    Ok(Json(products))
}

/// Get a product
pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(product_id): AppPath<Uuid>,
) -> AppResult<Json<Product>> {
    let product = service(&state).get(current_user.id(), product_id).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(product_id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let product = service(&state)
        .update(current_user.id(), product_id, input)
        .await?;
    Ok(Json(product))
}

/// Delete a product
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(product_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    service(&state)
        .delete(current_user.id(), product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add stock to a product
pub async fn add_product_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(product_id): AppPath<Uuid>,
    AppJson(input): AppJson<RestockInput>,
) -> AppResult<Json<Product>> {
    let added_quantity = input
        .added_quantity
        .ok_or_else(|| AppError::MissingField("added_quantity".to_string()))?;
    let product = service(&state)
        .restock(current_user.id(), product_id, added_quantity)
        .await?;
    Ok(Json(product))
}
