//! # Report Repository
//!
//! Loads the bills inside a report window and hands them to
//! [`tally_core::report::aggregate`].
//!
//! Windows are computed on the shop's wall clock and converted to UTC
//! with a fixed offset before querying. `created_at` is stored as RFC 3339
//! UTC text, so `BETWEEN` on the column compares instants correctly.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::SqlitePool;
use tally_core::report::{aggregate, missing_cost_product_ids};
use tally_core::{Bill, ReportPeriod, ReportWindow, SalesReport};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::bill::{attach_items, SELECT_BILL};
use crate::repository::product::fetch_purchase_prices;

/// Repository for sales reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Builds the sales report for the daily, weekly or monthly window
    /// containing `date`.
    ///
    /// Weekly windows run Monday to Sunday. Items sold before cost
    /// capture fall back to the product's current purchase price.
    pub async fn sales_report(
        &self,
        date: NaiveDate,
        period: ReportPeriod,
        offset: FixedOffset,
    ) -> DbResult<SalesReport> {
        let window = ReportWindow::for_date(date, period)?;
        let (start, end) = window.to_utc(offset);
        debug!(%period, %date, %start, %end, "Building sales report");

        let bills = self.bills_between(start, end).await?;

        let missing = missing_cost_product_ids(&bills);
        let fallback_costs = fetch_purchase_prices(&self.pool, &missing).await?;

        let report = aggregate(period, window, bills, &fallback_costs)?;
        debug!(
            bills = report.bill_count,
            net_sales = %report.net_sales,
            profit = %report.profit,
            "Sales report built"
        );

        Ok(report)
    }

    /// Bills created in `[start, end]` (inclusive), newest first, with items.
    pub async fn bills_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Bill>> {
        let mut conn = self.pool.acquire().await?;

        let mut bills = sqlx::query_as::<_, Bill>(&format!(
            "{SELECT_BILL} WHERE created_at BETWEEN ?1 AND ?2 ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;

        attach_items(&mut conn, &mut bills).await?;
        Ok(bills)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use crate::error::DbError;
    use tally_core::{CoreError, Money, NewBill, NewBillItem, NewProduct, Product};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    async fn product(db: &Database, name: &str, price: &str, cost: &str) -> Product {
        db.products()
            .create(&NewProduct::from_form(name, "100", price, Some(cost)).unwrap())
            .await
            .unwrap()
    }

    fn cart(p: &Product, quantity: i64) -> NewBill {
        NewBill {
            customer_name: None,
            total_amount: p.price() * quantity,
            items: vec![NewBillItem {
                product_id: p.id.clone(),
                name: p.name.clone(),
                quantity,
                price: p.price(),
                total: p.price() * quantity,
            }],
        }
    }

    #[tokio::test]
    async fn test_report_after_partial_return() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "10", "6").await;
        let bill = db.bills().save_bill(&cart(&pen, 10)).await.unwrap();
        db.returns()
            .return_bill_item(&bill.items[0].id, 4)
            .await
            .unwrap();

        let report = db
            .reports()
            .sales_report(Utc::now().date_naive(), ReportPeriod::Daily, utc())
            .await
            .unwrap();

        assert_eq!(report.bill_count, 1);
        assert_eq!(report.gross_sales, Money::from_cents(10_000));
        assert_eq!(report.returned_amount, Money::from_cents(4_000));
        assert_eq!(report.net_sales, Money::from_cents(6_000));
        assert_eq!(report.total_sales, report.net_sales);
        assert_eq!(report.product_value, Money::from_cents(3_600));
        assert_eq!(report.profit, Money::from_cents(2_400));

        assert_eq!(report.products.len(), 1);
        let line = &report.products[0];
        assert_eq!(line.name, "Pen");
        assert_eq!(line.quantity_sold, 10);
        assert_eq!(line.quantity_returned, 4);
        assert_eq!(line.net_quantity, 6);
    }

    #[tokio::test]
    async fn test_weekly_window_boundaries() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "10", "6").await;

        let monday_start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let sunday_late = Utc.with_ymd_and_hms(2024, 1, 21, 23, 59, 0).unwrap();
        let next_monday = Utc.with_ymd_and_hms(2024, 1, 22, 0, 0, 1).unwrap();
        let prev_sunday = Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 59).unwrap();

        for at in [monday_start, sunday_late, next_monday, prev_sunday] {
            db.bills().save_bill_at(&cart(&pen, 1), at).await.unwrap();
        }

        let wednesday = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        let report = db
            .reports()
            .sales_report(wednesday, ReportPeriod::Weekly, utc())
            .await
            .unwrap();

        assert_eq!(report.bill_count, 2);
        let times: Vec<_> = report.bills.iter().map(|b| b.created_at).collect();
        assert_eq!(times, vec![sunday_late, monday_start]);
    }

    #[tokio::test]
    async fn test_monthly_window() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "10", "6").await;

        for at in [
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        ] {
            db.bills().save_bill_at(&cart(&pen, 2), at).await.unwrap();
        }

        let report = db
            .reports()
            .sales_report(
                NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
                ReportPeriod::Monthly,
                utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.bill_count, 2);
        assert_eq!(report.gross_sales, Money::from_cents(4_000));
    }

    #[tokio::test]
    async fn test_offset_shifts_window() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "10", "6").await;

        // 01:00 on the 11th at UTC+5
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        db.bills().save_bill_at(&cart(&pen, 1), at).await.unwrap();

        let plus_five = FixedOffset::east_opt(5 * 3600).unwrap();
        let reports = db.reports();

        let on_11th = reports
            .sales_report(
                NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
                ReportPeriod::Daily,
                plus_five,
            )
            .await
            .unwrap();
        assert_eq!(on_11th.bill_count, 1);

        let on_10th = reports
            .sales_report(
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
                ReportPeriod::Daily,
                plus_five,
            )
            .await
            .unwrap();
        assert_eq!(on_10th.bill_count, 0);
    }

    #[tokio::test]
    async fn test_cost_falls_back_to_current_product_cost() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "10", "0").await;
        db.bills().save_bill(&cart(&pen, 3)).await.unwrap();

        sqlx::query("UPDATE products SET purchase_price_cents = 500 WHERE id = ?1")
            .bind(&pen.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = db
            .reports()
            .sales_report(Utc::now().date_naive(), ReportPeriod::Daily, utc())
            .await
            .unwrap();

        assert_eq!(report.product_value, Money::from_cents(1_500));
        assert_eq!(report.profit, Money::from_cents(1_500));
    }

    #[tokio::test]
    async fn test_oversized_legacy_line_fails_cleanly() {
        let db = test_db().await;
        let pen = product(&db, "Pen", "10", "6").await;
        let bill = db.bills().save_bill(&cart(&pen, 1)).await.unwrap();

        // Written behind validation's back
        sqlx::query("UPDATE bill_items SET quantity = ?2, price_cents = ?2 WHERE id = ?1")
            .bind(&bill.items[0].id)
            .bind(10_000_000_000i64)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db
            .reports()
            .sales_report(Utc::now().date_naive(), ReportPeriod::Daily, utc())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AmountOverflow(_))));
    }

    #[tokio::test]
    async fn test_empty_report() {
        let db = test_db().await;
        let report = db
            .reports()
            .sales_report(
                NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                ReportPeriod::Monthly,
                utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.bill_count, 0);
        assert!(report.products.is_empty());
        assert!(report.net_sales.is_zero());
        assert!(report.profit.is_zero());
    }
}
