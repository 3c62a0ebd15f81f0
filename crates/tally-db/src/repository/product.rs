//! # Product Repository
//!
//! Database operations for the Product Store.
//!
//! ## Key Operations
//! - Listing in display order (letters first, digit-leading names last)
//! - Create / rename / manual price / absolute quantity / hard delete
//! - Atomic stock adjustment
//!
//! ## Stock Adjustment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read, check, then write (two steps, races)                  │
//! │     SELECT quantity ...; if qty + delta < 0 { fail }; UPDATE ...       │
//! │                                                                         │
//! │  ✅ CORRECT: one conditional statement                                 │
//! │     UPDATE products SET quantity = quantity + ?delta                   │
//! │     WHERE id = ?id AND (?delta >= 0 OR quantity + ?delta >= 0)         │
//! │                                                                         │
//! │  0 rows affected → re-read to tell NotFound from InsufficientStock.    │
//! │  Two terminals selling the last unit: exactly one succeeds.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tally_core::types::compare_display_names;
use tally_core::validation::{
    validate_id, validate_price_cents, validate_product_name, validate_stock_delta,
    validate_stock_quantity,
};
use tally_core::{CoreError, LedgerEvent, Money, NewProduct, Product};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::events::EventBus;

const SELECT_PRODUCT: &str = r#"
    SELECT
        id,
        name,
        quantity,
        price_cents,
        purchase_price_cents,
        manual_price_cents,
        created_at,
        updated_at
    FROM products
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let pen = repo.create(&NewProduct::from_form("Pen", "100", "10", Some("6"))?).await?;
/// let pen = repo.adjust_stock(&pen.id, -1).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    events: EventBus,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        ProductRepository { pool, events }
    }

    /// Lists every product in display order.
    ///
    /// Names not starting with a digit come first (case-insensitive
    /// alphabetical), then digit-leading names in the same order.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let mut products = sqlx::query_as::<_, Product>(SELECT_PRODUCT)
            .fetch_all(&self.pool)
            .await?;

        products.sort_by(|a, b| compare_display_names(&a.name, &b.name));

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn find(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its ID, failing with `ProductNotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        self.find(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// * `Validation` - empty name, negative quantity or price
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        input.validate()?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: input.name.trim().to_string(),
            quantity: input.quantity,
            price_cents: input.price.cents(),
            purchase_price_cents: input.purchase_price.cents(),
            manual_price_cents: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(name = %product.name, quantity = product.quantity, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, quantity,
                price_cents, purchase_price_cents, manual_price_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.quantity)
        .bind(product.price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.manual_price_cents)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, name = %product.name, "Product created");
        self.events.publish(LedgerEvent::ProductCreated {
            product_id: product.id.clone(),
        });

        Ok(product)
    }

    /// Applies a signed stock delta atomically.
    ///
    /// Negative deltas may not take stock below zero; positive deltas are
    /// always accepted.
    ///
    /// ## Errors
    /// * `ProductNotFound` - no such product
    /// * `InsufficientStock` - a negative delta exceeds the stock on hand;
    ///   the quantity is left unchanged
    /// * `Validation` - the delta's magnitude exceeds `MAX_QUANTITY`
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id = %id, delta = %delta, "Adjusting stock");
        validate_stock_delta(delta)?;

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                quantity = quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
              AND (?2 >= 0 OR quantity + ?2 >= 0)
            RETURNING
                id, name, quantity,
                price_cents, purchase_price_cents, manual_price_cents,
                created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        let Some(product) = updated else {
            // Nothing matched: either the product is gone or the floor held
            let current = self.get(id).await?;
            return Err(CoreError::InsufficientStock {
                product_id: id.to_string(),
                available: current.quantity,
                requested: delta.saturating_neg(),
            }
            .into());
        };

        info!(id = %id, delta = %delta, quantity = product.quantity, "Stock adjusted");
        self.events.publish(LedgerEvent::StockAdjusted {
            product_id: product.id.clone(),
            delta,
            quantity: product.quantity,
        });

        Ok(product)
    }

    /// Sets the manual price override. Zero clears it.
    pub async fn set_manual_price(&self, id: &str, price: Money) -> DbResult<Product> {
        validate_price_cents(price.cents())?;
        self.update_column(id, "manual_price_cents", price.cents())
            .await
    }

    /// Renames a product. Bills keep the name they were sold under.
    pub async fn rename(&self, id: &str, name: &str) -> DbResult<Product> {
        validate_product_name(name)?;

        let now = Utc::now();
        let result = sqlx::query("UPDATE products SET name = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(name.trim())
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        self.updated(id).await
    }

    /// Sets the absolute stock level (stock take). Negative values are rejected.
    pub async fn set_quantity(&self, id: &str, quantity: i64) -> DbResult<Product> {
        validate_stock_quantity(quantity)?;
        self.update_column(id, "quantity", quantity).await
    }

    /// Hard-deletes a product.
    ///
    /// Bill items that sold it keep their copy of name, price and cost; their
    /// product reference is left dangling on purpose.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        validate_id("id", id)?;
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        info!(id = %id, "Product deleted");
        self.events.publish(LedgerEvent::ProductDeleted {
            product_id: id.to_string(),
        });

        Ok(())
    }

    /// Counts products (seed idempotency, diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Current unit costs for the given products. Missing ids are absent
    /// from the map.
    pub async fn purchase_prices(&self, ids: &[String]) -> DbResult<HashMap<String, Money>> {
        fetch_purchase_prices(&self.pool, ids).await
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn update_column(&self, id: &str, column: &'static str, value: i64) -> DbResult<Product> {
        debug!(id = %id, column, value, "Updating product");

        let sql = format!("UPDATE products SET {column} = ?2, updated_at = ?3 WHERE id = ?1");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        self.updated(id).await
    }

    async fn updated(&self, id: &str) -> DbResult<Product> {
        let product = self.get(id).await?;
        self.events.publish(LedgerEvent::ProductUpdated {
            product_id: id.to_string(),
        });
        Ok(product)
    }
}

/// Batch lookup of current unit costs, usable inside a transaction.
pub(crate) async fn fetch_purchase_prices<'e, E>(
    executor: E,
    ids: &[String],
) -> DbResult<HashMap<String, Money>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder =
        QueryBuilder::<Sqlite>::new("SELECT id, purchase_price_cents FROM products WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows: Vec<(String, i64)> = builder.build_query_as().fetch_all(executor).await?;

    Ok(rows
        .into_iter()
        .map(|(id, cents)| (id, Money::from_cents(cents)))
        .collect())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn pen() -> NewProduct {
        NewProduct::from_form("Pen", "100", "10", Some("6")).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_db().await;
        let created = db.products().create(&pen()).await.unwrap();

        let fetched = db.products().get(&created.id).await.unwrap();
        assert_eq!(fetched.name, "Pen");
        assert_eq!(fetched.quantity, 100);
        assert_eq!(fetched.price_cents, 1000);
        assert_eq!(fetched.purchase_price_cents, 600);
        assert_eq!(fetched.manual_price_cents, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let db = test_db().await;
        let input = NewProduct {
            name: "  ".to_string(),
            ..pen()
        };
        let err = db.products().create(&input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_display_order() {
        let db = test_db().await;
        for name in ["10 Pack Pens", "pencil", "2B Eraser", "Apple"] {
            let input = NewProduct {
                name: name.to_string(),
                ..pen()
            };
            db.products().create(&input).await.unwrap();
        }

        let names: Vec<String> = db
            .products()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Apple", "pencil", "10 Pack Pens", "2B Eraser"]);
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let db = test_db().await;
        let p = db.products().create(&pen()).await.unwrap();

        let p = db.products().adjust_stock(&p.id, -30).await.unwrap();
        assert_eq!(p.quantity, 70);

        let p = db.products().adjust_stock(&p.id, 5).await.unwrap();
        assert_eq!(p.quantity, 75);

        let p = db.products().adjust_stock(&p.id, -75).await.unwrap();
        assert_eq!(p.quantity, 0);
    }

    #[tokio::test]
    async fn test_adjust_stock_insufficient_leaves_quantity() {
        let db = test_db().await;
        let p = db.products().create(&pen()).await.unwrap();

        let err = db.products().adjust_stock(&p.id, -101).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 100,
                requested: 101,
                ..
            })
        ));
        assert_eq!(db.products().get(&p.id).await.unwrap().quantity, 100);
    }

    #[tokio::test]
    async fn test_adjust_stock_extreme_deltas_rejected() {
        let db = test_db().await;
        let p = db.products().create(&pen()).await.unwrap();

        for delta in [i64::MIN, i64::MAX] {
            let err = db.products().adjust_stock(&p.id, delta).await.unwrap_err();
            assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        }
        assert_eq!(db.products().get(&p.id).await.unwrap().quantity, 100);
    }

    #[tokio::test]
    async fn test_adjust_stock_unknown_product() {
        let db = test_db().await;
        let err = db.products().adjust_stock("missing", -1).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_go_negative() {
        let db = test_db().await;
        let input = NewProduct {
            quantity: 5,
            ..pen()
        };
        let p = db.products().create(&input).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let repo = db.products();
            let id = p.id.clone();
            tasks.spawn(async move { repo.adjust_stock(&id, -1).await.is_ok() });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        assert_eq!(db.products().get(&p.id).await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_updates() {
        let db = test_db().await;
        let p = db.products().create(&pen()).await.unwrap();

        let p = db
            .products()
            .set_manual_price(&p.id, Money::from_cents(850))
            .await
            .unwrap();
        assert_eq!(p.effective_price().cents(), 850);

        let p = db.products().rename(&p.id, "Blue Pen").await.unwrap();
        assert_eq!(p.name, "Blue Pen");

        let p = db.products().set_quantity(&p.id, 12).await.unwrap();
        assert_eq!(p.quantity, 12);

        assert!(db.products().set_quantity(&p.id, -1).await.is_err());
        assert!(db.products().rename(&p.id, "").await.is_err());
        assert!(db.products().rename("missing", "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        let p = db.products().create(&pen()).await.unwrap();

        db.products().delete(&p.id).await.unwrap();
        assert!(db.products().find(&p.id).await.unwrap().is_none());
        assert!(db.products().delete(&p.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_purchase_prices_batch() {
        let db = test_db().await;
        let a = db.products().create(&pen()).await.unwrap();

        let prices = db
            .products()
            .purchase_prices(&[a.id.clone(), "gone".to_string()])
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&a.id].cents(), 600);
        assert!(db.products().purchase_prices(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_published() {
        let db = test_db().await;
        let mut rx = db.subscribe();

        let p = db.products().create(&pen()).await.unwrap();
        db.products().adjust_stock(&p.id, -2).await.unwrap();
        let _ = db.products().adjust_stock(&p.id, -1000).await;

        let events = rx.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LedgerEvent::ProductCreated { .. }));
        assert!(matches!(
            events[1],
            LedgerEvent::StockAdjusted { quantity: 98, .. }
        ));
    }
}
