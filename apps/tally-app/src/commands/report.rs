//! # Report Commands
//!
//! Period sales reports and month-end snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::{
    Money, MonthlySnapshot, MonthlySnapshotInput, ProductBreakdown, ReportPeriod, SalesReport,
};
use tracing::info;

use super::bill::BillDto;
use crate::error::ApiError;
use crate::state::AppState;

/// Sales report for the presentation layer. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReportDto {
    pub period: ReportPeriod,
    /// Wall-clock window, inclusive.
    pub window_start: String,
    pub window_end: String,
    /// Net of returns; same as `net_sales`.
    pub total_sales: Money,
    pub gross_sales: Money,
    pub returned_amount: Money,
    pub net_sales: Money,
    pub product_value: Money,
    pub profit: Money,
    pub bill_count: u32,
    pub products: Vec<ProductBreakdown>,
    pub bills: Vec<BillDto>,
}

impl From<SalesReport> for SalesReportDto {
    fn from(report: SalesReport) -> Self {
        const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
        SalesReportDto {
            period: report.period,
            window_start: report.window.start.format(WINDOW_FORMAT).to_string(),
            window_end: report.window.end.format(WINDOW_FORMAT).to_string(),
            total_sales: report.total_sales,
            gross_sales: report.gross_sales,
            returned_amount: report.returned_amount,
            net_sales: report.net_sales,
            product_value: report.product_value,
            profit: report.profit,
            bill_count: report.bill_count,
            products: report.products,
            bills: report.bills.into_iter().map(BillDto::from).collect(),
        }
    }
}

/// Monthly snapshot DTO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub id: String,
    pub month: u32,
    pub year: i32,
    pub total_sales_cents: i64,
    pub total_profit_cents: i64,
    pub total_returns_cents: i64,
    pub saved_at: String,
}

impl From<MonthlySnapshot> for SnapshotDto {
    fn from(s: MonthlySnapshot) -> Self {
        SnapshotDto {
            id: s.id,
            month: s.month,
            year: s.year,
            total_sales_cents: s.total_sales_cents,
            total_profit_cents: s.total_profit_cents,
            total_returns_cents: s.total_returns_cents,
            saved_at: s.saved_at.to_rfc3339(),
        }
    }
}

/// Report for the daily, weekly (Mon-Sun) or monthly window around `date`.
pub async fn get_sales_report(
    state: &AppState,
    date: NaiveDate,
    period: ReportPeriod,
) -> Result<SalesReportDto, ApiError> {
    let report = state
        .db()
        .reports()
        .sales_report(date, period, state.report_offset())
        .await?;
    Ok(report.into())
}

pub async fn save_monthly_snapshot(
    state: &AppState,
    month: u32,
    year: i32,
    metrics: &MonthlySnapshotInput,
) -> Result<SnapshotDto, ApiError> {
    let snapshot = state.db().snapshots().save(month, year, metrics).await?;
    info!(month, year, "save_monthly_snapshot");
    Ok(snapshot.into())
}

/// Snapshots, most recent month first.
pub async fn list_snapshots(state: &AppState) -> Result<Vec<SnapshotDto>, ApiError> {
    let snapshots = state.db().snapshots().list().await?;
    Ok(snapshots.into_iter().map(SnapshotDto::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::{FixedOffset, TimeZone, Utc};
    use tally_core::{NewBill, NewBillItem, NewProduct};
    use tally_db::{Database, DbConfig};

    async fn test_state() -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        AppState::new(db, FixedOffset::east_opt(0).unwrap())
    }

    #[tokio::test]
    async fn test_monthly_report_to_snapshot() {
        let state = test_state().await;
        let pen = state
            .db()
            .products()
            .create(&NewProduct::from_form("Pen", "100", "10", Some("6")).unwrap())
            .await
            .unwrap();

        let price = Money::from_cents(1000);
        let sold_at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let bill = state
            .db()
            .bills()
            .save_bill_at(
                &NewBill {
                    customer_name: None,
                    total_amount: price * 10,
                    items: vec![NewBillItem {
                        product_id: pen.id.clone(),
                        name: pen.name.clone(),
                        quantity: 10,
                        price,
                        total: price * 10,
                    }],
                },
                sold_at,
            )
            .await
            .unwrap();
        state
            .db()
            .returns()
            .return_bill_item(&bill.items[0].id, 4)
            .await
            .unwrap();

        let report = get_sales_report(
            &state,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            ReportPeriod::Monthly,
        )
        .await
        .unwrap();

        assert_eq!(report.window_start, "2024-01-01T00:00:00.000");
        assert_eq!(report.window_end, "2024-01-31T23:59:59.999");
        assert_eq!(report.total_sales, Money::from_cents(6_000));
        assert_eq!(report.profit, Money::from_cents(2_400));
        assert_eq!(report.bills.len(), 1);

        let metrics = MonthlySnapshotInput {
            total_sales: report.total_sales,
            total_profit: report.profit,
            total_returns: report.returned_amount,
        };
        let snapshot = save_monthly_snapshot(&state, 1, 2024, &metrics)
            .await
            .unwrap();
        assert_eq!(snapshot.total_returns_cents, 4_000);

        let listed = list_snapshots(&state).await.unwrap();
        assert_eq!(listed, vec![snapshot]);
    }

    #[tokio::test]
    async fn test_snapshot_month_out_of_range() {
        let state = test_state().await;
        let metrics = MonthlySnapshotInput {
            total_sales: Money::zero(),
            total_profit: Money::zero(),
            total_returns: Money::zero(),
        };
        let err = save_monthly_snapshot(&state, 13, 2024, &metrics)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
