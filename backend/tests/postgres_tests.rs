//! Postgres store tests
//!
//! These run against a real database and are ignored by default. Point
//! `INVM_TEST_DATABASE_URL` at a scratch database and run with
//! `cargo test --test postgres_tests -- --ignored`.
//!
//! Properties covered:
//! - The conditional decrement never takes stock below zero
//! - Dropping a transaction without commit discards its writes
//! - The partial unique index allows one active alert per product
//! - SKUs are unique regardless of case
//! - A locked product read makes concurrent stock changes wait
//! - Quantity overflow surfaces as a validation error
//! - Sale and statement sort columns produce valid SQL

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{dec, RecordingSink};
use inventory_manager_backend::services::ledger::StatementQuery;
use inventory_manager_backend::services::product::UpdateProductInput;
use inventory_manager_backend::services::sale::{RecordSaleInput, SaleItemInput, SaleQuery};
use inventory_manager_backend::services::{
    LedgerService, Notifier, ProductService, SaleService,
};
use inventory_manager_backend::store::{
    PgStore, ProductRepository, StockAlertRepository, Store, StoreTx,
};
use inventory_manager_backend::AppError;
use shared::{MovementSort, Product, SaleSort, SortOrder, StockAlert};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("INVM_TEST_DATABASE_URL")
        .expect("INVM_TEST_DATABASE_URL must point at a scratch database");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn seed_owner(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind("Postgres Owner")
        .execute(pool)
        .await
        .unwrap();
    id
}

fn unique_sku(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn product(owner: Uuid, sku: &str, quantity: i64, reorder_level: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        user_id: owner,
        name: format!("Product {}", sku),
        sku: sku.to_string(),
        category_id: None,
        quantity,
        reorder_level,
        price: dec("5.00"),
        cost: dec("2.00"),
        created_at: now,
        updated_at: now,
    }
}

async fn seed_product(store: &dyn Store, product: &Product) {
    let mut tx = store.begin().await.unwrap();
    tx.insert_product(product).await.unwrap();
    tx.commit().await.unwrap();
}

async fn current(store: &dyn Store, owner: Uuid, id: Uuid) -> Product {
    let mut tx = store.begin().await.unwrap();
    tx.find_product(owner, id).await.unwrap().unwrap()
}

fn sell(product_id: Uuid, quantity: i64) -> RecordSaleInput {
    RecordSaleInput {
        items: vec![SaleItemInput {
            product_id: Some(product_id),
            quantity: Some(quantity),
        }],
        ..Default::default()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test that the conditional decrement refuses to oversell
    #[tokio::test]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_decrement_refuses_oversell() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store = PgStore::new(pool);
        let item = product(owner, &unique_sku("DEC"), 3, 0);
        seed_product(&store, &item).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.decrement_quantity(owner, item.id, 5).await.unwrap().is_none());
        let sold = tx.decrement_quantity(owner, item.id, 3).await.unwrap().unwrap();
        assert_eq!(sold.quantity, 0);
        assert!(tx.decrement_quantity(Uuid::new_v4(), item.id, 1).await.unwrap().is_none());
        tx.commit().await.unwrap();

        assert_eq!(current(&store, owner, item.id).await.quantity, 0);
    }

    /// Test that an uncommitted transaction leaves no trace
    #[tokio::test]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_dropped_transaction_rolls_back() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store = PgStore::new(pool);
        let item = product(owner, &unique_sku("RB"), 10, 0);
        seed_product(&store, &item).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.decrement_quantity(owner, item.id, 4).await.unwrap().unwrap();
            tx.insert_alert(&StockAlert::raise(&item)).await.unwrap();
        }

        assert_eq!(current(&store, owner, item.id).await.quantity, 10);
        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_active_alert(owner, item.id).await.unwrap().is_none());
    }

    /// Test that a second active alert for the same product is refused
    #[tokio::test]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_one_active_alert_per_product() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store = PgStore::new(pool);
        let item = product(owner, &unique_sku("ALR"), 1, 5);
        seed_product(&store, &item).await;

        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_alert(&StockAlert::raise(&item)).await.unwrap();
        assert!(first.is_some());
        assert!(tx.insert_alert(&StockAlert::raise(&item)).await.unwrap().is_none());

        let dismissed = tx.dismiss_active_alerts(owner, item.id).await.unwrap();
        assert_eq!(dismissed.len(), 1);
        assert!(tx.insert_alert(&StockAlert::raise(&item)).await.unwrap().is_some());
        tx.commit().await.unwrap();
    }

    /// Test that SKUs differing only in case collide
    #[tokio::test]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_sku_unique_ignoring_case() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let other_owner = seed_owner(&pool).await;
        let store = PgStore::new(pool);

        let sku = unique_sku("case");
        seed_product(&store, &product(owner, &sku, 1, 0)).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_product(&product(other_owner, &sku.to_uppercase(), 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntry(ref f) if f == "sku"));
    }

    /// Test that a locked read holds off a concurrent decrement until the
    /// edit commits, so the edit cannot overwrite the sold quantity
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_locked_read_blocks_concurrent_decrement() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let item = product(owner, &unique_sku("LOCK"), 10, 0);
        seed_product(store.as_ref(), &item).await;

        let mut editor = store.begin().await.unwrap();
        let mut edited = editor
            .find_product_for_update(owner, item.id)
            .await
            .unwrap()
            .unwrap();

        let seller_store = store.clone();
        let seller = tokio::spawn(async move {
            let mut tx = seller_store.begin().await.unwrap();
            let sold = tx.decrement_quantity(owner, item.id, 2).await.unwrap();
            tx.commit().await.unwrap();
            sold
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!seller.is_finished());

        edited.price = dec("7.25");
        editor.update_product(&edited).await.unwrap();
        editor.commit().await.unwrap();

        let sold = seller.await.unwrap().unwrap();
        assert_eq!(sold.quantity, 8);

        let after = current(store.as_ref(), owner, item.id).await;
        assert_eq!(after.quantity, 8);
        assert_eq!(after.price, dec("7.25"));
    }

    /// Test that product edits racing with sales never undo a decrement
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_concurrent_edits_and_sales_keep_stock() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let item = product(owner, &unique_sku("RACE"), 40, 0);
        seed_product(store.as_ref(), &item).await;

        let notifier = Notifier::new(Arc::new(RecordingSink::default()));
        let products = ProductService::new(store.clone(), notifier.clone());
        let sales = SaleService::new(store.clone(), notifier);

        let mut handles = Vec::new();
        for round in 0..10 {
            let sales = sales.clone();
            handles.push(tokio::spawn(async move {
                sales.record_sale(owner, sell(item.id, 2)).await.map(|_| ())
            }));
            let products = products.clone();
            handles.push(tokio::spawn(async move {
                products
                    .update(
                        owner,
                        item.id,
                        UpdateProductInput {
                            price: Some(rust_decimal::Decimal::new(500 + round, 2)),
                            ..Default::default()
                        },
                    )
                    .await
                    .map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(current(store.as_ref(), owner, item.id).await.quantity, 20);
    }

    /// Test that pushing a quantity past BIGINT is reported as bad input
    #[tokio::test]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_increment_overflow_is_validation_error() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store = PgStore::new(pool);
        let item = product(owner, &unique_sku("OVF"), i64::MAX - 1, 0);
        seed_product(&store, &item).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.increment_quantity(owner, item.id, 10).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "added_quantity"));
        drop(tx);

        assert_eq!(current(&store, owner, item.id).await.quantity, i64::MAX - 1);
    }

    /// Test the sale and statement sort options against real SQL
    #[tokio::test]
    #[ignore = "requires INVM_TEST_DATABASE_URL"]
    async fn test_sort_options() {
        let pool = pool().await;
        let owner = seed_owner(&pool).await;
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let item = product(owner, &unique_sku("SORT"), 100, 0);
        seed_product(store.as_ref(), &item).await;

        let notifier = Notifier::new(Arc::new(RecordingSink::default()));
        let sales = SaleService::new(store.clone(), notifier);
        for quantity in [3, 7, 1] {
            sales.record_sale(owner, sell(item.id, quantity)).await.unwrap();
        }

        let by_total = sales
            .list(
                owner,
                SaleQuery {
                    sort: SaleSort::TotalAmount,
                    order: SortOrder::Asc,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let totals: Vec<_> = by_total.data.iter().map(|s| s.total_amount).collect();
        assert_eq!(totals, vec![dec("5.00"), dec("15.00"), dec("35.00")]);

        let statement = LedgerService::new(store.clone())
            .list(
                owner,
                StatementQuery {
                    product_id: Some(item.id),
                    sort: MovementSort::Quantity,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let quantities: Vec<_> = statement.data.iter().map(|s| s.movement.quantity).collect();
        assert_eq!(quantities, vec![7, 3, 1]);
    }
}
