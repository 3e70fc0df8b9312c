//! Route definitions for the Inventory Manager

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/products", product_routes())
        .nest("/sales", sale_routes())
        .route("/stock-statements", get(handlers::list_stock_statements))
        .nest("/stock-alerts", stock_alert_routes())
        .route("/events", get(handlers::stream_events))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Product routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:id",
            get(handlers::get_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:id/add-quantity", patch(handlers::add_product_quantity))
}

/// Sale routes (protected)
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/:id", get(handlers::get_sale))
}

/// Stock alert routes (protected)
fn stock_alert_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_alerts).post(handlers::create_stock_alert),
        )
        .route("/:id/dismiss", patch(handlers::dismiss_stock_alert))
        .route("/:id/read", patch(handlers::mark_stock_alert_read))
}
