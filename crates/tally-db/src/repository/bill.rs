//! # Bill Repository
//!
//! The Bill Ledger: saving sales, listing and looking up bills.
//!
//! ## Save Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_bill(NewBill)                                                     │
//! │       │                                                                 │
//! │       ├── validate_new_bill (before any I/O)                           │
//! │       ▼                                                                 │
//! │  BEGIN ───────────────────────────────────────────────────────────┐    │
//! │  │ 1. INSERT bill (status 'paid', total as submitted)             │    │
//! │  │ 2. batch fetch current purchase prices                         │    │
//! │  │ 3. INSERT one bill_item per cart line (name/price/cost frozen) │    │
//! │  │ 4. UPDATE products SET quantity = quantity - sold              │    │
//! │  │    (conditional under StockPolicy::RejectNegative)             │    │
//! │  COMMIT ◄─────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       └── publish BillSaved                                            │
//! │                                                                         │
//! │  Any `?` between BEGIN and COMMIT drops the transaction: no bill, no   │
//! │  items, no stock change.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tally_core::validation::{validate_customer_name, validate_new_bill};
use tally_core::{
    Bill, BillItem, BillStatus, CoreError, LedgerEvent, NewBill, StockPolicy, RECENT_BILLS_LIMIT,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::events::EventBus;
use crate::repository::product::fetch_purchase_prices;

pub(crate) const SELECT_BILL: &str = r#"
    SELECT
        id,
        customer_name,
        total_amount_cents,
        status,
        created_at,
        updated_at
    FROM bills
"#;

const SELECT_BILL_ITEM: &str = r#"
    SELECT
        id,
        bill_id,
        product_id,
        product_name,
        quantity,
        price_cents,
        purchase_price_cents,
        total_cents,
        returned_quantity,
        created_at
    FROM bill_items
"#;

/// Repository for bills and their items.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
    events: EventBus,
    stock_policy: StockPolicy,
    walk_in_customer: String,
}

impl BillRepository {
    /// Creates a new BillRepository.
    pub fn new(
        pool: SqlitePool,
        events: EventBus,
        stock_policy: StockPolicy,
        walk_in_customer: String,
    ) -> Self {
        BillRepository {
            pool,
            events,
            stock_policy,
            walk_in_customer,
        }
    }

    /// Records a sale and decrements stock, atomically.
    ///
    /// ## Errors
    /// * `Validation` - empty cart, non-positive quantity, negative amounts
    /// * `ProductNotFound` - a line references a product that doesn't exist
    /// * `InsufficientStock` - only under `StockPolicy::RejectNegative`
    ///
    /// Nothing is persisted when any of these occur.
    pub async fn save_bill(&self, input: &NewBill) -> DbResult<Bill> {
        self.save_bill_at(input, Utc::now()).await
    }

    /// Same as [`save_bill`](Self::save_bill) with an explicit sale time
    /// (backdated entry, imports, tests).
    pub async fn save_bill_at(&self, input: &NewBill, created_at: DateTime<Utc>) -> DbResult<Bill> {
        validate_new_bill(input)?;

        let product_ids = input.product_ids();
        debug!(
            lines = input.items.len(),
            products = product_ids.len(),
            total = %input.total_amount,
            "Saving bill"
        );

        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        // 1. Bill (first statement is a write: takes the write lock up front)
        let mut bill = Bill {
            id: Uuid::new_v4().to_string(),
            customer_name: input.customer_name_or(&self.walk_in_customer).to_string(),
            total_amount_cents: input.total_amount.cents(),
            status: BillStatus::Paid,
            created_at,
            updated_at: created_at,
            items: Vec::with_capacity(input.items.len()),
        };

        sqlx::query(
            r#"
            INSERT INTO bills (id, customer_name, total_amount_cents, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&bill.id)
        .bind(&bill.customer_name)
        .bind(bill.total_amount_cents)
        .bind(bill.status)
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&mut *tx)
        .await?;

        // 2. Historical cost basis
        let costs = fetch_purchase_prices(&mut *tx, &product_ids).await?;

        // 3. Items
        for line in &input.items {
            let item = BillItem {
                id: Uuid::new_v4().to_string(),
                bill_id: bill.id.clone(),
                product_id: Some(line.product_id.clone()),
                product_name: line.name.clone(),
                quantity: line.quantity,
                price_cents: line.price.cents(),
                purchase_price_cents: costs
                    .get(&line.product_id)
                    .map(|cost| cost.cents())
                    .unwrap_or(0),
                total_cents: line.total.cents(),
                returned_quantity: 0,
                created_at,
            };

            sqlx::query(
                r#"
                INSERT INTO bill_items (
                    id, bill_id, product_id, product_name, quantity,
                    price_cents, purchase_price_cents, total_cents,
                    returned_quantity, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&item.bill_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price_cents)
            .bind(item.purchase_price_cents)
            .bind(item.total_cents)
            .bind(item.returned_quantity)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            bill.items.push(item);
        }

        // 4. Stock
        for line in &input.items {
            decrement_stock(&mut *tx, &line.product_id, line.quantity, self.stock_policy).await?;
        }

        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            bill_id = %bill.id,
            customer = %bill.customer_name,
            total = %bill.total_amount(),
            "Bill saved"
        );
        self.events.publish(LedgerEvent::BillSaved {
            bill_id: bill.id.clone(),
            product_ids,
        });

        Ok(bill)
    }

    /// The most recent bills (newest first), each with its items.
    pub async fn list_recent(&self) -> DbResult<Vec<Bill>> {
        self.list_recent_limit(RECENT_BILLS_LIMIT).await
    }

    /// Like [`list_recent`](Self::list_recent) with a custom limit.
    pub async fn list_recent_limit(&self, limit: u32) -> DbResult<Vec<Bill>> {
        let mut conn = self.pool.acquire().await?;

        let mut bills = sqlx::query_as::<_, Bill>(&format!(
            "{SELECT_BILL} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        attach_items(&mut conn, &mut bills).await?;

        debug!(count = bills.len(), "Listed recent bills");
        Ok(bills)
    }

    /// Gets one bill with its items.
    pub async fn get(&self, id: &str) -> DbResult<Bill> {
        let mut conn = self.pool.acquire().await?;
        fetch_bill(&mut conn, id).await
    }

    /// Changes the customer name. Status and stock are untouched.
    pub async fn rename(&self, id: &str, customer_name: &str) -> DbResult<Bill> {
        validate_customer_name(customer_name)?;

        let result =
            sqlx::query("UPDATE bills SET customer_name = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(customer_name.trim())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::BillNotFound(id.to_string()).into());
        }

        info!(bill_id = %id, "Bill renamed");
        self.events.publish(LedgerEvent::BillRenamed {
            bill_id: id.to_string(),
        });

        self.get(id).await
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Decrements one product's stock inside the save transaction.
async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    policy: StockPolicy,
) -> DbResult<()> {
    let sql = match policy {
        StockPolicy::AllowNegative => {
            "UPDATE products SET quantity = quantity - ?2, updated_at = ?3 WHERE id = ?1"
        }
        StockPolicy::RejectNegative => {
            "UPDATE products SET quantity = quantity - ?2, updated_at = ?3 \
             WHERE id = ?1 AND quantity - ?2 >= 0"
        }
    };

    let result = sqlx::query(sql)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    Err(match available {
        None => CoreError::ProductNotFound(product_id.to_string()),
        Some(available) => CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available,
            requested: quantity,
        },
    }
    .into())
}

/// Loads one bill and its items, or fails with `BillNotFound`.
pub(crate) async fn fetch_bill(conn: &mut SqliteConnection, id: &str) -> DbResult<Bill> {
    let bill = sqlx::query_as::<_, Bill>(&format!("{SELECT_BILL} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(bill) = bill else {
        return Err(CoreError::BillNotFound(id.to_string()).into());
    };

    let mut bills = vec![bill];
    attach_items(conn, &mut bills).await?;
    Ok(bills.remove(0))
}

/// Loads one bill item, or fails with `BillItemNotFound`.
pub(crate) async fn fetch_bill_item(conn: &mut SqliteConnection, id: &str) -> DbResult<BillItem> {
    sqlx::query_as::<_, BillItem>(&format!("{SELECT_BILL_ITEM} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::BillItemNotFound(id.to_string()).into())
}

/// Fills `items` on every bill with one query.
pub(crate) async fn attach_items(conn: &mut SqliteConnection, bills: &mut [Bill]) -> DbResult<()> {
    if bills.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(SELECT_BILL_ITEM);
    builder.push(" WHERE bill_id IN (");
    let mut separated = builder.separated(", ");
    for bill in bills.iter() {
        separated.push_bind(bill.id.clone());
    }
    separated.push_unseparated(")");
    builder.push(" ORDER BY rowid");

    let items: Vec<BillItem> = builder.build_query_as().fetch_all(&mut *conn).await?;

    let mut by_bill: HashMap<String, Vec<BillItem>> = HashMap::new();
    for item in items {
        by_bill.entry(item.bill_id.clone()).or_default().push(item);
    }
    for bill in bills.iter_mut() {
        bill.items = by_bill.remove(&bill.id).unwrap_or_default();
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
