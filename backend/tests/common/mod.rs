//! Shared fixtures for the service-level integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use inventory_manager_backend::services::notification::{DomainEvent, NotifyError};
use inventory_manager_backend::services::{
    AlertService, EventName, LedgerService, NotificationSink, Notifier, ProductService,
    SaleService,
};
use inventory_manager_backend::store::{MemoryStore, ProductRepository, Store, StoreTx};
use rust_decimal::Decimal;
use shared::{Customer, OwnerSummary, Product};
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<EventName> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, event: DomainEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Sink whose transport is always down
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn emit(&self, _event: DomainEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".to_string()))
    }
}

/// A memory-backed store with one seeded owner and services wired to a
/// recording sink
pub struct Fixture {
    pub memory: MemoryStore,
    pub store: Arc<dyn Store>,
    pub sink: Arc<RecordingSink>,
    pub owner: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        let memory = MemoryStore::new();
        let owner = Uuid::new_v4();
        memory
            .seed_owner(OwnerSummary {
                id: owner,
                name: Some("Shop Owner".to_string()),
                email: Some("owner@example.com".to_string()),
            })
            .await;

        Self {
            store: Arc::new(memory.clone()),
            memory,
            sink: Arc::new(RecordingSink::default()),
            owner,
        }
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.sink.clone())
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.store.clone(), self.notifier())
    }

    pub fn sales(&self) -> SaleService {
        SaleService::new(self.store.clone(), self.notifier())
    }

    pub fn alerts(&self) -> AlertService {
        AlertService::new(self.store.clone(), self.notifier())
    }

    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(self.store.clone())
    }

    /// Insert a product straight into the store, bypassing opening-stock
    /// ledger entries and alert evaluation
    pub async fn seed_product(&self, sku: &str, quantity: i64, reorder_level: i64, price: &str) -> Product {
        self.seed_product_for(self.owner, sku, quantity, reorder_level, price)
            .await
    }

    pub async fn seed_product_for(
        &self,
        owner: Uuid,
        sku: &str,
        quantity: i64,
        reorder_level: i64,
        price: &str,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            user_id: owner,
            name: format!("Product {}", sku),
            sku: sku.to_string(),
            category_id: None,
            quantity,
            reorder_level,
            price: dec(price),
            cost: dec("1.00"),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();
        product
    }

    pub async fn seed_customer(&self, name: &str) -> Customer {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            user_id: self.owner,
            name: name.to_string(),
            phone: Some("0812345678".to_string()),
            email: Some("customer@example.com".to_string()),
            address: Some("12 Market Road".to_string()),
            note: None,
            created_at: now,
            updated_at: now,
        };
        self.memory.seed_customer(customer.clone()).await;
        customer
    }

    pub async fn quantity_of(&self, product_id: Uuid) -> Option<i64> {
        self.memory
            .snapshot()
            .await
            .products
            .get(&product_id)
            .map(|p| p.quantity)
    }
}
