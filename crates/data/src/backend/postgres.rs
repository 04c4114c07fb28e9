//! `PostgreSQL` backend.
//!
//! # Tables
//!
//! - `customers`
//! - `products`
//! - `orders`
//! - `order_lines` - `order_id` references `orders` (deferred foreign key)
//!
//! Each commit runs in one transaction. The resolver reads through the
//! transaction with row locks (`FOR KEY SHARE` on referenced rows,
//! `FOR UPDATE` on cascaded order lines), so the checks hold until the
//! writes land.
//!
//! # Migrations
//!
//! Migrations live in `crates/data/migrations/` and run via:
//! ```bash
//! cargo run -p bugstore-cli -- migrate
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::error::ErrorKind;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use async_trait::async_trait;
use bugstore_core::{
    Customer, CustomerId, Entity, EntityKey, EntityKind, Order, OrderId, OrderLine, OrderLineId,
    Product, ProductId, Record,
};

use super::{Backend, BackendKind};
use crate::batch::PendingBatch;
use crate::config::PostgresConfig;
use crate::error::StoreError;
use crate::resolver::{self, CommitPlan, CommitSummary, StateView};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    birth_date: NaiveDate,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: CustomerId::new(row.id),
            name: row.name,
            email: row.email,
            phone: row.phone,
            birth_date: row.birth_date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    title: String,
    description: String,
    slug: String,
    price: Decimal,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            title: row.title,
            description: row.description,
            slug: row.slug,
            price: row.price,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
            lines: None,
            customer: None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    total: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            total: row.total,
            product: None,
        }
    }
}

// =============================================================================
// SQL
// =============================================================================

const fn select_all(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customer => {
            "SELECT id, name, email, phone, birth_date FROM customers ORDER BY id"
        }
        EntityKind::Product => {
            "SELECT id, title, description, slug, price FROM products ORDER BY id"
        }
        EntityKind::Order => {
            "SELECT id, customer_id, created_at, updated_at FROM orders ORDER BY id"
        }
        EntityKind::OrderLine => {
            "SELECT id, order_id, product_id, quantity, total FROM order_lines ORDER BY id"
        }
    }
}

const fn select_one(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customer => {
            "SELECT id, name, email, phone, birth_date FROM customers WHERE id = $1"
        }
        EntityKind::Product => {
            "SELECT id, title, description, slug, price FROM products WHERE id = $1"
        }
        EntityKind::Order => {
            "SELECT id, customer_id, created_at, updated_at FROM orders WHERE id = $1"
        }
        EntityKind::OrderLine => {
            "SELECT id, order_id, product_id, quantity, total FROM order_lines WHERE id = $1"
        }
    }
}

const fn lock_one(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customer => "SELECT id FROM customers WHERE id = $1 FOR KEY SHARE",
        EntityKind::Product => "SELECT id FROM products WHERE id = $1 FOR KEY SHARE",
        EntityKind::Order => "SELECT id FROM orders WHERE id = $1 FOR KEY SHARE",
        EntityKind::OrderLine => "SELECT id FROM order_lines WHERE id = $1 FOR KEY SHARE",
    }
}

const fn delete_one(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customer => "DELETE FROM customers WHERE id = $1",
        EntityKind::Product => "DELETE FROM products WHERE id = $1",
        EntityKind::Order => "DELETE FROM orders WHERE id = $1",
        EntityKind::OrderLine => "DELETE FROM order_lines WHERE id = $1",
    }
}

const UPSERT_CUSTOMER: &str = r"
    INSERT INTO customers (id, name, email, phone, birth_date)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (id) DO UPDATE SET
        name = EXCLUDED.name,
        email = EXCLUDED.email,
        phone = EXCLUDED.phone,
        birth_date = EXCLUDED.birth_date
";

const UPSERT_PRODUCT: &str = r"
    INSERT INTO products (id, title, description, slug, price)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (id) DO UPDATE SET
        title = EXCLUDED.title,
        description = EXCLUDED.description,
        slug = EXCLUDED.slug,
        price = EXCLUDED.price
";

const UPSERT_ORDER: &str = r"
    INSERT INTO orders (id, customer_id, created_at, updated_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (id) DO UPDATE SET
        customer_id = EXCLUDED.customer_id,
        created_at = EXCLUDED.created_at,
        updated_at = EXCLUDED.updated_at
";

const UPSERT_ORDER_LINE: &str = r"
    INSERT INTO order_lines (id, order_id, product_id, quantity, total)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (id) DO UPDATE SET
        order_id = EXCLUDED.order_id,
        product_id = EXCLUDED.product_id,
        quantity = EXCLUDED.quantity,
        total = EXCLUDED.total
";

/// Map constraint failures reported by `PostgreSQL` onto the store taxonomy.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                let detail = db
                    .constraint()
                    .map_or_else(|| db.message().to_owned(), |c| format!("{c}: {}", db.message()));
                return StoreError::ConstraintViolation(detail);
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

// =============================================================================
// Resolver view
// =============================================================================

/// Committed state read through the commit transaction.
struct PgView<'a> {
    conn: &'a mut PgConnection,
}

#[async_trait]
impl StateView for PgView<'_> {
    async fn contains(&mut self, key: EntityKey) -> Result<bool, StoreError> {
        let found: Option<Uuid> = sqlx::query_scalar(lock_one(key.kind))
            .bind(key.id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(found.is_some())
    }

    async fn order_line_ids(&mut self, order: OrderId) -> Result<Vec<OrderLineId>, StoreError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM order_lines WHERE order_id = $1 FOR UPDATE")
                .bind(order.as_uuid())
                .fetch_all(&mut *self.conn)
                .await?;
        Ok(ids.into_iter().map(OrderLineId::new).collect())
    }
}

async fn write(conn: &mut PgConnection, record: &Record) -> Result<(), sqlx::Error> {
    match record {
        Record::Customer(c) => {
            sqlx::query(UPSERT_CUSTOMER)
                .bind(c.id.as_uuid())
                .bind(&c.name)
                .bind(&c.email)
                .bind(&c.phone)
                .bind(c.birth_date)
                .execute(conn)
                .await?;
        }
        Record::Product(p) => {
            sqlx::query(UPSERT_PRODUCT)
                .bind(p.id.as_uuid())
                .bind(&p.title)
                .bind(&p.description)
                .bind(&p.slug)
                .bind(p.price)
                .execute(conn)
                .await?;
        }
        Record::Order(o) => {
            sqlx::query(UPSERT_ORDER)
                .bind(o.id.as_uuid())
                .bind(o.customer_id.as_uuid())
                .bind(o.created_at)
                .bind(o.updated_at)
                .execute(conn)
                .await?;
        }
        Record::OrderLine(l) => {
            sqlx::query(UPSERT_ORDER_LINE)
                .bind(l.id.as_uuid())
                .bind(l.order_id.as_uuid())
                .bind(l.product_id.as_uuid())
                .bind(l.quantity)
                .bind(l.total)
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}

async fn apply(conn: &mut PgConnection, plan: &CommitPlan) -> Result<(), sqlx::Error> {
    for key in &plan.deletes {
        sqlx::query(delete_one(key.kind))
            .bind(key.id)
            .execute(&mut *conn)
            .await?;
    }
    for record in &plan.writes {
        write(&mut *conn, record).await?;
    }
    Ok(())
}

// =============================================================================
// Backend
// =============================================================================

/// Durable backend over a `PostgreSQL` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connect a pool using `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(config.database_url.expose_secret())
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn fetch(&self, key: EntityKey) -> Result<Option<Record>, StoreError> {
        let sql = select_one(key.kind);
        let record = match key.kind {
            EntityKind::Customer => sqlx::query_as::<_, CustomerRow>(sql)
                .bind(key.id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| Customer::from(row).into_record()),
            EntityKind::Product => sqlx::query_as::<_, ProductRow>(sql)
                .bind(key.id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| Product::from(row).into_record()),
            EntityKind::Order => sqlx::query_as::<_, OrderRow>(sql)
                .bind(key.id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| Order::from(row).into_record()),
            EntityKind::OrderLine => sqlx::query_as::<_, OrderLineRow>(sql)
                .bind(key.id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| OrderLine::from(row).into_record()),
        };
        Ok(record)
    }

    async fn scan(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        let sql = select_all(kind);
        let records = match kind {
            EntityKind::Customer => sqlx::query_as::<_, CustomerRow>(sql)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| Customer::from(row).into_record())
                .collect(),
            EntityKind::Product => sqlx::query_as::<_, ProductRow>(sql)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| Product::from(row).into_record())
                .collect(),
            EntityKind::Order => sqlx::query_as::<_, OrderRow>(sql)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| Order::from(row).into_record())
                .collect(),
            EntityKind::OrderLine => sqlx::query_as::<_, OrderLineRow>(sql)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| OrderLine::from(row).into_record())
                .collect(),
        };
        Ok(records)
    }

    #[instrument(skip(self, batch), fields(mutations = batch.len()))]
    async fn commit(&self, batch: &PendingBatch) -> Result<CommitSummary, StoreError> {
        let mut tx = self.pool.begin().await?;

        let plan = {
            let mut view = PgView { conn: &mut *tx };
            resolver::resolve(batch, &mut view).await?
        };
        let summary = plan.summary();

        apply(&mut *tx, &plan).await.map_err(classify)?;
        // Deferred foreign keys are checked here.
        tx.commit().await.map_err(classify)?;

        debug!(?summary, "postgres commit applied");
        Ok(summary)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_target_the_right_table() {
        let tables = ["customers", "products", "orders", "order_lines"];
        for (kind, name) in EntityKind::ALL.into_iter().zip(tables) {
            assert!(select_all(kind).contains(&format!("FROM {name} ")));
            assert!(select_one(kind).contains(&format!("FROM {name} WHERE id = $1")));
            assert!(lock_one(kind).ends_with("FOR KEY SHARE"));
            assert_eq!(delete_one(kind), format!("DELETE FROM {name} WHERE id = $1"));
        }
    }

    #[test]
    fn test_non_database_errors_are_not_constraint_violations() {
        let err = classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
