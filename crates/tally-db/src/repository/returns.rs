//! # Return Repository
//!
//! The Return Processor: full returns, single-line returns and bill
//! deletion, each as one transaction that puts stock back on the shelf.
//!
//! ## Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  return_bill_full                                                       │
//! │    UPDATE bills SET status = 'returned'                                │
//! │    WHERE id = ? AND status != 'returned'      ← 0 rows: AlreadyReturned │
//! │                                                                         │
//! │  return_bill_item                                                       │
//! │    UPDATE bill_items SET returned_quantity = returned_quantity + ?n    │
//! │    WHERE id = ? AND returned_quantity + ?n <= quantity  ← 0 rows:      │
//! │                                                          OverReturn     │
//! │                                                                         │
//! │  Both are checked up front from the loaded rows too; the conditional   │
//! │  UPDATE is what holds when two callers race.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock for a product deleted since the sale cannot be restored; that
//! line is skipped with a warning and the return still goes through.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tally_core::ledger::{
    plan_delete_restore, plan_full_return, plan_item_return, recompute_status, StockRestore,
};
use tally_core::validation::{validate_id, validate_return_quantity};
use tally_core::{Bill, BillStatus, CoreError, LedgerEvent};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::events::EventBus;
use crate::repository::bill::{fetch_bill, fetch_bill_item};

/// Repository for returns and bill deletion.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
    events: EventBus,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        ReturnRepository { pool, events }
    }

    /// Returns every outstanding unit on a bill.
    ///
    /// Lines already fully returned are left alone; every other line gets
    /// `returned_quantity = quantity` and its outstanding units go back to
    /// stock.
    ///
    /// ## Errors
    /// * `BillNotFound`
    /// * `AlreadyReturned` - the bill is already `RETURNED`
    pub async fn return_bill_full(&self, bill_id: &str) -> DbResult<Bill> {
        validate_id("bill_id", bill_id)?;
        debug!(bill_id = %bill_id, "Full return");

        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        let bill = fetch_bill(&mut *tx, bill_id).await?;
        let restores = plan_full_return(&bill)?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE bills SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status != ?2",
        )
        .bind(bill_id)
        .bind(BillStatus::Returned)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyReturned(bill_id.to_string()).into());
        }

        for restore in &restores {
            sqlx::query("UPDATE bill_items SET returned_quantity = quantity WHERE id = ?1")
                .bind(&restore.item_id)
                .execute(&mut *tx)
                .await?;
        }
        let product_ids = restore_stock_all(&mut *tx, &restores).await?;

        let updated = fetch_bill(&mut *tx, bill_id).await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            bill_id = %bill_id,
            lines = restores.len(),
            "Bill fully returned"
        );
        self.events.publish(LedgerEvent::BillReturned {
            bill_id: bill_id.to_string(),
            product_ids,
        });

        Ok(updated)
    }

    /// Returns `quantity` units of one bill line.
    ///
    /// Afterwards the bill's status is recomputed from all its lines:
    /// `RETURNED` once every line is fully returned, otherwise `PARTIAL`.
    ///
    /// ## Errors
    /// * `Validation` - `quantity <= 0`
    /// * `BillItemNotFound`
    /// * `OverReturn` - more than the outstanding units; nothing changes
    pub async fn return_bill_item(&self, item_id: &str, quantity: i64) -> DbResult<Bill> {
        validate_id("item_id", item_id)?;
        validate_return_quantity(quantity)?;
        debug!(item_id = %item_id, quantity, "Item return");

        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        let item = fetch_bill_item(&mut *tx, item_id).await?;
        plan_item_return(&item, quantity)?;

        let result = sqlx::query(
            r#"
            UPDATE bill_items
            SET returned_quantity = returned_quantity + ?2
            WHERE id = ?1
              AND returned_quantity + ?2 <= quantity
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OverReturn {
                item_id: item_id.to_string(),
                outstanding: item.outstanding_quantity(),
                requested: quantity,
            }
            .into());
        }

        restore_stock_all(
            &mut *tx,
            &[StockRestore {
                item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                quantity,
            }],
        )
        .await?;

        let mut bill = fetch_bill(&mut *tx, &item.bill_id).await?;
        let status = recompute_status(bill.status, &bill.items);

        if status != bill.status {
            let now = Utc::now();
            sqlx::query("UPDATE bills SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&bill.id)
                .bind(status)
                .bind(now)
                .execute(&mut *tx)
                .await?;

            info!(bill_id = %bill.id, from = %bill.status, to = %status, "Bill status changed");
            bill.status = status;
            bill.updated_at = now;
        }

        tx.commit().await.map_err(DbError::transaction)?;

        info!(item_id = %item_id, quantity, "Bill item returned");
        self.events.publish(LedgerEvent::BillItemReturned {
            bill_id: bill.id.clone(),
            item_id: item_id.to_string(),
            quantity,
            status: bill.status,
        });

        Ok(bill)
    }

    /// Deletes a bill and its items.
    ///
    /// Unless the bill is already `RETURNED` (stock given back by the full
    /// return), each line's outstanding units are restored first.
    pub async fn delete_bill(&self, bill_id: &str) -> DbResult<()> {
        validate_id("bill_id", bill_id)?;
        debug!(bill_id = %bill_id, "Deleting bill");

        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        let bill = fetch_bill(&mut *tx, bill_id).await?;
        let restores = plan_delete_restore(&bill);
        let product_ids = restore_stock_all(&mut *tx, &restores).await?;

        sqlx::query("DELETE FROM bill_items WHERE bill_id = ?1")
            .bind(bill_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM bills WHERE id = ?1")
            .bind(bill_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            bill_id = %bill_id,
            status = %bill.status,
            restored_lines = restores.len(),
            "Bill deleted"
        );
        self.events.publish(LedgerEvent::BillDeleted {
            bill_id: bill_id.to_string(),
            product_ids,
        });

        Ok(())
    }
}

/// Puts stock back for each restore, returning the products touched.
async fn restore_stock_all(
    conn: &mut SqliteConnection,
    restores: &[StockRestore],
) -> DbResult<Vec<String>> {
    let mut touched: Vec<String> = Vec::new();

    for restore in restores {
        let Some(product_id) = restore.product_id.as_deref() else {
            warn!(item_id = %restore.item_id, "Bill item has no product link, stock not restored");
            continue;
        };

        let result = sqlx::query(
            "UPDATE products SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(product_id)
        .bind(restore.quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!(
                product_id = %product_id,
                item_id = %restore.item_id,
                quantity = restore.quantity,
                "Product no longer exists, stock not restored"
            );
            continue;
        }

        if !touched.iter().any(|id| id == product_id) {
            touched.push(product_id.to_string());
        }
    }

    Ok(touched)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::{NewBill, NewBillItem, NewProduct, Product};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn product(db: &Database, name: &str, qty: &str) -> Product {
        db.products()
            .create(&NewProduct::from_form(name, qty, "10", Some("6")).unwrap())
            .await
            .unwrap()
    }

    async fn sell(db: &Database, lines: &[(&Product, i64)]) -> Bill {
        let items: Vec<NewBillItem> = lines
            .iter()
            .map(|(p, qty)| NewBillItem {
                product_id: p.id.clone(),
                name: p.name.clone(),
                quantity: *qty,
                price: p.price(),
                total: p.price() * *qty,
            })
            .collect();
        let bill = NewBill {
            customer_name: None,
            total_amount: items.iter().map(|i| i.total).sum(),
            items,
        };
        db.bills().save_bill(&bill).await.unwrap()
    }

    async fn stock(db: &Database, p: &Product) -> i64 {
        db.products().get(&p.id).await.unwrap().quantity
    }

    #[tokio::test]
    async fn test_partial_return() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 10)]).await;
        assert_eq!(stock(&db, &pen).await, 90);

        let bill = db
            .returns()
            .return_bill_item(&bill.items[0].id, 4)
            .await
            .unwrap();

        assert_eq!(stock(&db, &pen).await, 94);
        assert_eq!(bill.items[0].returned_quantity, 4);
        assert_eq!(bill.status, BillStatus::Partial);
        assert_eq!(bill.total_amount_cents, 10_000);
    }

    #[tokio::test]
    async fn test_over_return_rejected() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 5)]).await;
        let item_id = bill.items[0].id.clone();

        db.returns().return_bill_item(&item_id, 3).await.unwrap();
        let err = db.returns().return_bill_item(&item_id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OverReturn {
                outstanding: 2,
                requested: 3,
                ..
            })
        ));

        let bill = db.bills().get(&bill.id).await.unwrap();
        assert_eq!(bill.items[0].returned_quantity, 3);
        assert_eq!(stock(&db, &pen).await, 98);
    }

    #[tokio::test]
    async fn test_return_quantity_must_be_positive() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 5)]).await;

        let err = db
            .returns()
            .return_bill_item(&bill.items[0].id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_line_returns_reach_returned() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let ink = product(&db, "Ink", "100").await;
        let bill = sell(&db, &[(&pen, 2), (&ink, 1)]).await;

        let after_first = db
            .returns()
            .return_bill_item(&bill.items[0].id, 2)
            .await
            .unwrap();
        assert_eq!(after_first.status, BillStatus::Partial);

        let after_last = db
            .returns()
            .return_bill_item(&bill.items[1].id, 1)
            .await
            .unwrap();
        assert_eq!(after_last.status, BillStatus::Returned);

        // Full return is now a duplicate
        let err = db.returns().return_bill_full(&bill.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AlreadyReturned(_))));
    }

    #[tokio::test]
    async fn test_full_return_after_partial() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let ink = product(&db, "Ink", "50").await;
        let bill = sell(&db, &[(&pen, 10), (&ink, 3)]).await;

        db.returns()
            .return_bill_item(&bill.items[0].id, 4)
            .await
            .unwrap();
        db.returns()
            .return_bill_item(&bill.items[1].id, 3)
            .await
            .unwrap();

        let bill = db.returns().return_bill_full(&bill.id).await.unwrap();
        assert_eq!(bill.status, BillStatus::Returned);
        assert!(bill.items.iter().all(|i| i.returned_quantity == i.quantity));

        // Each line restored exactly what was sold, once
        assert_eq!(stock(&db, &pen).await, 100);
        assert_eq!(stock(&db, &ink).await, 50);

        let err = db.returns().return_bill_full(&bill.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AlreadyReturned(_))));
        assert_eq!(stock(&db, &pen).await, 100);
    }

    #[tokio::test]
    async fn test_full_return_unknown_bill() {
        let db = test_db().await;
        let err = db.returns().return_bill_full("missing").await.unwrap_err();
        assert!(err.is_not_found());
        let err = db.returns().return_bill_item("missing", 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_bill_restores_outstanding() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 10)]).await;
        db.returns()
            .return_bill_item(&bill.items[0].id, 4)
            .await
            .unwrap();
        assert_eq!(stock(&db, &pen).await, 94);

        db.returns().delete_bill(&bill.id).await.unwrap();

        assert_eq!(stock(&db, &pen).await, 100);
        assert!(db.bills().get(&bill.id).await.unwrap_err().is_not_found());
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bill_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(items, 0);
    }

    #[tokio::test]
    async fn test_delete_returned_bill_restores_nothing() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 10)]).await;

        db.returns().return_bill_full(&bill.id).await.unwrap();
        assert_eq!(stock(&db, &pen).await, 100);

        db.returns().delete_bill(&bill.id).await.unwrap();
        assert_eq!(stock(&db, &pen).await, 100);

        assert!(db.returns().delete_bill(&bill.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_return_for_deleted_product_still_succeeds() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 3)]).await;
        db.products().delete(&pen.id).await.unwrap();

        let bill = db
            .returns()
            .return_bill_item(&bill.items[0].id, 3)
            .await
            .unwrap();
        assert_eq!(bill.status, BillStatus::Returned);
        assert!(db.products().find(&pen.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_return_events() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "100").await;
        let bill = sell(&db, &[(&pen, 2)]).await;
        let mut rx = db.subscribe();

        db.returns()
            .return_bill_item(&bill.items[0].id, 1)
            .await
            .unwrap();
        let _ = db.returns().return_bill_item(&bill.items[0].id, 5).await;
        db.returns().return_bill_full(&bill.id).await.unwrap();
        db.returns().delete_bill(&bill.id).await.unwrap();

        let events = rx.drain();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            LedgerEvent::BillItemReturned {
                quantity: 1,
                status: BillStatus::Partial,
                ..
            }
        ));
        assert!(matches!(events[1], LedgerEvent::BillReturned { .. }));
        assert!(matches!(events[2], LedgerEvent::BillDeleted { .. }));
    }
}
