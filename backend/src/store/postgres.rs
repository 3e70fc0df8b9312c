//! PostgreSQL datastore backed by sqlx

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::{
    AlertStatus, Customer, CustomerContact, OwnerSummary, Pagination, Product, ProductSummary,
    Sale, SaleItem, StockAlert, StockDirection, StockMovement,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{
    like_pattern, AlertFilter, CustomerRepository, MovementFilter, ProductFilter,
    ProductRepository, SaleFilter, SaleRepository, StockAlertRepository,
    StockMovementRepository, Store, StoreTx, UserRepository,
};
use crate::error::{AppError, AppResult};

const PRODUCT_COLUMNS: &str =
    "id, user_id, name, sku, category_id, quantity, reorder_level, price, cost, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, user_id, product_id, direction, quantity, note, created_at";

const ALERT_COLUMNS: &str =
    "id, product_id, user_id, current_quantity, reorder_level, is_read, status, created_at, updated_at";

const SALE_COLUMNS: &str =
    "id, user_id, customer_id, name, phone, email, address, note, total_amount, sale_date, created_at";

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";
const NUMERIC_OUT_OF_RANGE: &str = "22003";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Open Postgres transaction; rolled back by sqlx when dropped uncommitted
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("transaction already committed".to_string()))
    }
}

fn map_out_of_range(err: sqlx::Error, field: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) {
            return AppError::invalid(field, "Quantity is out of range");
        }
    }
    AppError::DatabaseError(err)
}

fn map_unique(err: sqlx::Error, field: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return AppError::DuplicateEntry(field.to_string());
        }
    }
    AppError::DatabaseError(err)
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("invalid {} in database: {}", what, err))
}

fn day_bounds(date: chrono::NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    (start, start + Duration::days(1))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    sku: String,
    category_id: Option<Uuid>,
    quantity: i64,
    reorder_level: i64,
    price: Decimal,
    cost: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            sku: row.sku,
            category_id: row.category_id,
            quantity: row.quantity,
            reorder_level: row.reorder_level,
            price: row.price,
            cost: row.cost,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    direction: String,
    quantity: i64,
    note: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(StockMovement {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            direction: StockDirection::from_str(&row.direction)
                .map_err(|e| corrupt("stock direction", e))?,
            quantity: row.quantity,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AlertRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    current_quantity: i64,
    reorder_level: i64,
    is_read: bool,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for StockAlert {
    type Error = AppError;

    fn try_from(row: AlertRow) -> AppResult<Self> {
        Ok(StockAlert {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            current_quantity: row.current_quantity,
            reorder_level: row.reorder_level,
            is_read: row.is_read,
            status: AlertStatus::from_str(&row.status).map_err(|e| corrupt("alert status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn alerts_from_rows(rows: Vec<AlertRow>) -> AppResult<Vec<StockAlert>> {
    rows.into_iter().map(StockAlert::try_from).collect()
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    user_id: Uuid,
    customer_id: Option<Uuid>,
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    note: Option<String>,
    total_amount: Decimal,
    sale_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> Sale {
        Sale {
            id: self.id,
            user_id: self.user_id,
            customer_id: self.customer_id,
            contact: CustomerContact {
                name: self.name,
                phone: self.phone,
                email: self.email,
                address: self.address,
                note: self.note,
            },
            items,
            total_amount: self.total_amount,
            sale_date: self.sale_date,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    sale_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
    total: Decimal,
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            address: row.address,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Filter builders
// ============================================================================

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &ProductFilter) {
    qb.push(" WHERE user_id = ").push_bind(owner);
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_movement_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    owner: Uuid,
    filter: &MovementFilter,
) {
    qb.push(" WHERE user_id = ").push_bind(owner);
    if let Some(product_id) = filter.product_id {
        qb.push(" AND product_id = ").push_bind(product_id);
    }
    if let Some(direction) = filter.direction {
        qb.push(" AND direction = ").push_bind(direction.as_str());
    }
    if let Some(from) = filter.range.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.range.to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND product_id IN (SELECT id FROM products WHERE name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_alert_filters(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &AlertFilter) {
    qb.push(" WHERE user_id = ").push_bind(owner);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if filter.unread_only {
        qb.push(" AND is_read = FALSE");
    }
}

fn push_sale_filters(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &SaleFilter) {
    qb.push(" WHERE user_id = ").push_bind(owner);
    if let Some(date) = filter.date {
        let (start, end) = day_bounds(date);
        qb.push(" AND sale_date >= ")
            .push_bind(start)
            .push(" AND sale_date < ")
            .push_bind(end);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (");
        let mut fields = qb.separated(" OR ");
        for column in ["name", "phone", "email", "address", "note"] {
            fields.push(format!("{} ILIKE ", column));
            fields.push_bind_unseparated(pattern.clone());
        }
        qb.push(")");
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Pagination) {
    qb.push(" LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(page.offset() as i64);
}

// ============================================================================
// Repositories
// ============================================================================

#[async_trait]
impl ProductRepository for PgTx {
    async fn find_product(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = $1 AND user_id = $2",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn find_product_for_update(
        &mut self,
        owner: Uuid,
        id: Uuid,
    ) -> AppResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = $1 AND user_id = $2 FOR UPDATE",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn find_product_by_sku(&mut self, sku: &str) -> AppResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE LOWER(sku) = LOWER($1)",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(sku)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn category_exists(&mut self, id: Uuid) -> AppResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(id)
                .fetch_one(self.conn()?)
                .await?;
        Ok(exists)
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, user_id, name, sku, category_id, quantity, reorder_level,
                price, cost, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id)
        .bind(product.user_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(product.quantity)
        .bind(product.reorder_level)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_unique(e, "sku"))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $3, sku = $4, category_id = $5, quantity = $6, reorder_level = $7,
                price = $8, cost = $9, updated_at = $10
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(product.id)
        .bind(product.user_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(product.quantity)
        .bind(product.reorder_level)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_unique(e, "sku"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    async fn delete_product(&mut self, owner: Uuid, id: Uuid) -> AppResult<bool> {
        let conn = self.conn()?;
        sqlx::query("DELETE FROM stock_alerts WHERE product_id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(
        &mut self,
        owner: Uuid,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Product>, u64)> {
        let conn = self.conn()?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, owner, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&mut *conn)
            .await?;

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_product_filters(&mut qb, owner, filter);
        qb.push(format!(
            " ORDER BY {} {}, id",
            filter.sort.column(),
            filter.order.as_sql()
        ));
        push_page(&mut qb, page);
        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&mut *conn)
            .await?;

        Ok((rows.into_iter().map(Product::from).collect(), total as u64))
    }

    async fn decrement_quantity(
        &mut self,
        owner: Uuid,
        id: Uuid,
        quantity: i64,
    ) -> AppResult<Option<Product>> {
        let sql = format!(
            r#"
            UPDATE products
            SET quantity = quantity - $1, updated_at = NOW()
            WHERE id = $2 AND user_id = $3 AND quantity >= $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(quantity)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn increment_quantity(
        &mut self,
        owner: Uuid,
        id: Uuid,
        quantity: i64,
    ) -> AppResult<Option<Product>> {
        let sql = format!(
            r#"
            UPDATE products
            SET quantity = quantity + $1, updated_at = NOW()
            WHERE id = $2 AND user_id = $3
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(quantity)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_out_of_range(e, "added_quantity"))?;
        Ok(row.map(Product::from))
    }

    async fn product_summaries(
        &mut self,
        owner: Uuid,
        ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, ProductSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, name, sku FROM products WHERE user_id = $1 AND id = ANY($2)",
        )
        .bind(owner)
        .bind(ids.to_vec())
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, sku)| (id, ProductSummary { id, name, sku }))
            .collect())
    }
}

#[async_trait]
impl StockMovementRepository for PgTx {
    async fn append_movement(&mut self, movement: &StockMovement) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, user_id, product_id, direction, quantity, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id)
        .bind(movement.user_id)
        .bind(movement.product_id)
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(&movement.note)
        .bind(movement.created_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn list_movements(
        &mut self,
        owner: Uuid,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockMovement>, u64)> {
        let conn = self.conn()?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM stock_movements");
        push_movement_filters(&mut count, owner, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&mut *conn)
            .await?;

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM stock_movements", MOVEMENT_COLUMNS));
        push_movement_filters(&mut qb, owner, filter);
        qb.push(format!(
            " ORDER BY {} {}, id",
            filter.sort.column(),
            filter.order.as_sql()
        ));
        push_page(&mut qb, page);
        let rows = qb
            .build_query_as::<MovementRow>()
            .fetch_all(&mut *conn)
            .await?;

        let movements = rows
            .into_iter()
            .map(StockMovement::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((movements, total as u64))
    }
}

#[async_trait]
impl StockAlertRepository for PgTx {
    async fn find_active_alert(
        &mut self,
        owner: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<StockAlert>> {
        let sql = format!(
            "SELECT {} FROM stock_alerts WHERE product_id = $1 AND user_id = $2 AND status = 'active'",
            ALERT_COLUMNS
        );
        sqlx::query_as::<_, AlertRow>(&sql)
            .bind(product_id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?
            .map(StockAlert::try_from)
            .transpose()
    }

    async fn insert_alert(&mut self, alert: &StockAlert) -> AppResult<Option<StockAlert>> {
        let sql = format!(
            r#"
            INSERT INTO stock_alerts (
                id, product_id, user_id, current_quantity, reorder_level,
                is_read, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (product_id, user_id) WHERE status = 'active' DO NOTHING
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );
        sqlx::query_as::<_, AlertRow>(&sql)
            .bind(alert.id)
            .bind(alert.product_id)
            .bind(alert.user_id)
            .bind(alert.current_quantity)
            .bind(alert.reorder_level)
            .bind(alert.is_read)
            .bind(alert.status.as_str())
            .bind(alert.created_at)
            .bind(alert.updated_at)
            .fetch_optional(self.conn()?)
            .await?
            .map(StockAlert::try_from)
            .transpose()
    }

    async fn dismiss_active_alerts(
        &mut self,
        owner: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockAlert>> {
        let sql = format!(
            r#"
            UPDATE stock_alerts
            SET status = 'dismissed', updated_at = NOW()
            WHERE product_id = $1 AND user_id = $2 AND status = 'active'
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(product_id)
            .bind(owner)
            .fetch_all(self.conn()?)
            .await?;
        alerts_from_rows(rows)
    }

    async fn dismiss_alert(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<StockAlert>> {
        let sql = format!(
            r#"
            UPDATE stock_alerts
            SET status = 'dismissed', updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'active'
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );
        sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?
            .map(StockAlert::try_from)
            .transpose()
    }

    async fn mark_alert_read(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<StockAlert>> {
        let sql = format!(
            r#"
            UPDATE stock_alerts
            SET is_read = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );
        sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?
            .map(StockAlert::try_from)
            .transpose()
    }

    async fn list_alerts(
        &mut self,
        owner: Uuid,
        filter: &AlertFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockAlert>, u64)> {
        let conn = self.conn()?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM stock_alerts");
        push_alert_filters(&mut count, owner, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&mut *conn)
            .await?;

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM stock_alerts", ALERT_COLUMNS));
        push_alert_filters(&mut qb, owner, filter);
        qb.push(" ORDER BY created_at DESC, id");
        push_page(&mut qb, page);
        let rows = qb.build_query_as::<AlertRow>().fetch_all(&mut *conn).await?;

        Ok((alerts_from_rows(rows)?, total as u64))
    }
}

impl PgTx {
    async fn load_items(&mut self, sale_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<SaleItem>>> {
        let rows = sqlx::query_as::<_, SaleItemRow>(
            r#"
            SELECT sale_id, product_id, quantity, unit_price, total
            FROM sale_items
            WHERE sale_id = ANY($1)
            ORDER BY sale_id, position
            "#,
        )
        .bind(sale_ids.to_vec())
        .fetch_all(self.conn()?)
        .await?;

        let mut items: HashMap<Uuid, Vec<SaleItem>> = HashMap::new();
        for row in rows {
            items.entry(row.sale_id).or_default().push(SaleItem {
                product_id: row.product_id,
                quantity: row.quantity,
                unit_price: row.unit_price,
                total: row.total,
            });
        }
        Ok(items)
    }
}

#[async_trait]
impl SaleRepository for PgTx {
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, user_id, customer_id, name, phone, email, address, note,
                total_amount, sale_date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(sale.id)
        .bind(sale.user_id)
        .bind(sale.customer_id)
        .bind(&sale.contact.name)
        .bind(&sale.contact.phone)
        .bind(&sale.contact.email)
        .bind(&sale.contact.address)
        .bind(&sale.contact.note)
        .bind(sale.total_amount)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        for (position, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (sale_id, position, product_id, quantity, unit_price, total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(sale.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn find_sale(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales WHERE id = $1 AND user_id = $2",
            SALE_COLUMNS
        );
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.conn()?)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = self.load_items(&[row.id]).await?;
        let sale_items = items.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_sale(sale_items)))
    }

    async fn list_sales(
        &mut self,
        owner: Uuid,
        filter: &SaleFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Sale>, u64)> {
        let conn = self.conn()?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM sales");
        push_sale_filters(&mut count, owner, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&mut *conn)
            .await?;

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM sales", SALE_COLUMNS));
        push_sale_filters(&mut qb, owner, filter);
        qb.push(format!(
            " ORDER BY {} {}, id",
            filter.sort.column(),
            filter.order.as_sql()
        ));
        push_page(&mut qb, page);
        let rows = qb.build_query_as::<SaleRow>().fetch_all(&mut *conn).await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;
        let sales = rows
            .into_iter()
            .map(|row| {
                let sale_items = items.remove(&row.id).unwrap_or_default();
                row.into_sale(sale_items)
            })
            .collect();

        Ok((sales, total as u64))
    }
}

#[async_trait]
impl CustomerRepository for PgTx {
    async fn find_customer(&mut self, owner: Uuid, id: Uuid) -> AppResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, user_id, name, phone, email, address, note, created_at, updated_at
            FROM customers
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row.map(Customer::from))
    }
}

#[async_trait]
impl UserRepository for PgTx {
    async fn find_owner(&mut self, id: Uuid) -> AppResult<Option<OwnerSummary>> {
        let row = sqlx::query_as::<_, (Uuid, Option<String>, Option<String>)>(
            "SELECT id, name, email FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row.map(|(id, name, email)| OwnerSummary { id, name, email }))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(&mut self) -> AppResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}
