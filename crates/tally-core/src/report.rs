//! # Sales Reports
//!
//! Report window computation and the sales/profit aggregation over the
//! bills that fall inside a window.
//!
//! ## Report Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  (date, period) ──► ReportWindow::for_date ──► [start, end] wall clock │
//! │                                                   │                     │
//! │                               to_utc(offset) ◄────┘                     │
//! │                                   │                                     │
//! │  tally-db: bills WHERE created_at BETWEEN start AND end (with items)   │
//! │                                   │                                     │
//! │           missing_cost_product_ids ──► current product costs (batch)   │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                       aggregate(bills, fallback costs)                  │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │   SalesReport { gross, returned, net, product value, profit, lines }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Figures
//! Per item: gross = sold × unit price, returned = returned × unit price,
//! cost = (sold − returned) × unit cost. The unit cost is the one captured
//! at sale time, or the product's current cost when none was captured.
//! `net_sales = gross_sales − returned_amount`,
//! `profit = net_sales − product_value`. The headline `total_sales` is
//! `net_sales`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Bill, MonthlySnapshotInput};

// =============================================================================
// Report Period
// =============================================================================

/// Length of a report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReportPeriod {
    /// The given calendar day.
    Daily,
    /// The Monday-to-Sunday week containing the date.
    Weekly,
    /// The calendar month containing the date.
    Monthly,
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPeriod::Daily => write!(f, "daily"),
            ReportPeriod::Weekly => write!(f, "weekly"),
            ReportPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(ReportPeriod::Daily),
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            _ => Err(ValidationError::NotAllowed {
                field: "period".to_string(),
                allowed: vec![
                    "daily".to_string(),
                    "weekly".to_string(),
                    "monthly".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Report Window
// =============================================================================

/// Inclusive wall-clock range `[start, end]` covered by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportWindow {
    /// First day of the window at 00:00:00.000.
    #[ts(as = "String")]
    pub start: NaiveDateTime,
    /// Last day of the window at 23:59:59.999.
    #[ts(as = "String")]
    pub end: NaiveDateTime,
}

impl ReportWindow {
    /// Computes the window of `period` that contains `date`.
    ///
    /// Weeks start on Monday; a Sunday belongs to the week that began six
    /// days earlier.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use tally_core::report::{ReportPeriod, ReportWindow};
    ///
    /// let wednesday = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
    /// let window = ReportWindow::for_date(wednesday, ReportPeriod::Weekly).unwrap();
    /// assert_eq!(window.start.date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    /// assert_eq!(window.end.date(), NaiveDate::from_ymd_opt(2024, 1, 21).unwrap());
    /// ```
    pub fn for_date(date: NaiveDate, period: ReportPeriod) -> CoreResult<Self> {
        let (first, last) = match period {
            ReportPeriod::Daily => (date, date),
            ReportPeriod::Weekly => {
                let back = u64::from(date.weekday().num_days_from_monday());
                let monday = date
                    .checked_sub_days(Days::new(back))
                    .ok_or_else(|| out_of_range(date))?;
                let sunday = monday
                    .checked_add_days(Days::new(6))
                    .ok_or_else(|| out_of_range(date))?;
                (monday, sunday)
            }
            ReportPeriod::Monthly => {
                let first = date.with_day(1).ok_or_else(|| out_of_range(date))?;
                let next_month = if date.month() == 12 {
                    NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
                };
                let last = next_month
                    .and_then(|d| d.pred_opt())
                    .ok_or_else(|| out_of_range(date))?;
                (first, last)
            }
        };

        let start = first
            .and_hms_milli_opt(0, 0, 0, 0)
            .ok_or_else(|| out_of_range(date))?;
        let end = last
            .and_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| out_of_range(date))?;

        Ok(ReportWindow { start, end })
    }

    /// Whether a wall-clock instant falls inside the window (inclusive).
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    /// Converts the window to UTC instants, reading the wall clock at the
    /// given fixed offset.
    pub fn to_utc(&self, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        let shift = chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
        (
            Utc.from_utc_datetime(&(self.start - shift)),
            Utc.from_utc_datetime(&(self.end - shift)),
        )
    }
}

fn out_of_range(date: NaiveDate) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "date".to_string(),
        reason: format!("{date} is outside the supported calendar range"),
    }
}

// =============================================================================
// Report Output
// =============================================================================

/// Per-product line of a sales report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductBreakdown {
    /// `None` for lines sold without a product link.
    pub product_id: Option<String>,
    /// Name as printed on the most recent bill in the window.
    pub name: String,
    pub quantity_sold: i64,
    pub quantity_returned: i64,
    pub net_quantity: i64,
    pub gross_revenue: Money,
    pub returned_value: Money,
    /// gross_revenue − returned_value
    pub net_revenue: Money,
    pub cost: Money,
    /// net_revenue − cost
    pub profit: Money,
}

/// Sales and profit figures over one report window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalesReport {
    pub period: ReportPeriod,
    pub window: ReportWindow,
    /// Headline sales figure: net of returns (same value as `net_sales`).
    pub total_sales: Money,
    pub gross_sales: Money,
    pub returned_amount: Money,
    pub net_sales: Money,
    /// Cost of goods sold, net of returned units.
    pub product_value: Money,
    pub profit: Money,
    pub bill_count: u32,
    /// Sorted by net revenue, highest first.
    pub products: Vec<ProductBreakdown>,
    /// Bills in the window, newest first, with items.
    pub bills: Vec<Bill>,
}

// =============================================================================
// Aggregation
// =============================================================================

/// Product ids whose items carry no captured cost and need the current
/// product cost as a fallback. Deduplicated, in first-seen order.
pub fn missing_cost_product_ids(bills: &[Bill]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for item in bills.iter().flat_map(|bill| bill.items.iter()) {
        if item.captured_cost().is_some() {
            continue;
        }
        if let Some(product_id) = &item.product_id {
            if !ids.contains(product_id) {
                ids.push(product_id.clone());
            }
        }
    }
    ids
}

/// Aggregates bills into a sales report.
///
/// `fallback_costs` maps product id to the product's current unit cost;
/// an item without a captured cost whose product is absent from the map
/// (deleted since the sale) contributes zero cost.
///
/// ## Errors
/// * `AmountOverflow` - a line value or running total leaves the `i64`
///   cent range
pub fn aggregate(
    period: ReportPeriod,
    window: ReportWindow,
    mut bills: Vec<Bill>,
    fallback_costs: &HashMap<String, Money>,
) -> CoreResult<SalesReport> {
    bills.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut gross_sales = Money::zero();
    let mut returned_amount = Money::zero();
    let mut product_value = Money::zero();

    let mut lines: HashMap<String, ProductBreakdown> = HashMap::new();

    // Oldest first so the newest bill's product name wins.
    for item in bills.iter().rev().flat_map(|bill| bill.items.iter()) {
        let unit_price = item.price();
        let gross = times(unit_price, item.quantity, "gross sales")?;
        let returned = times(unit_price, item.returned_quantity, "returned amount")?;
        let net_quantity = item.quantity - item.returned_quantity;

        let unit_cost = item.captured_cost().unwrap_or_else(|| {
            item.product_id
                .as_ref()
                .and_then(|id| fallback_costs.get(id).copied())
                .unwrap_or_default()
        });
        let cost = times(unit_cost, net_quantity, "product value")?;
        let net_revenue = minus(gross, returned, "net sales")?;
        let line_profit = minus(net_revenue, cost, "profit")?;

        gross_sales = plus(gross_sales, gross, "gross sales")?;
        returned_amount = plus(returned_amount, returned, "returned amount")?;
        product_value = plus(product_value, cost, "product value")?;

        let key = match &item.product_id {
            Some(id) => format!("id:{id}"),
            None => format!("name:{}", item.product_name),
        };
        let line = lines.entry(key).or_insert_with(|| ProductBreakdown {
            product_id: item.product_id.clone(),
            name: item.product_name.clone(),
            quantity_sold: 0,
            quantity_returned: 0,
            net_quantity: 0,
            gross_revenue: Money::zero(),
            returned_value: Money::zero(),
            net_revenue: Money::zero(),
            cost: Money::zero(),
            profit: Money::zero(),
        });
        line.name = item.product_name.clone();
        line.quantity_sold = count(line.quantity_sold, item.quantity)?;
        line.quantity_returned = count(line.quantity_returned, item.returned_quantity)?;
        line.net_quantity = count(line.net_quantity, net_quantity)?;
        line.gross_revenue = plus(line.gross_revenue, gross, "gross sales")?;
        line.returned_value = plus(line.returned_value, returned, "returned amount")?;
        line.net_revenue = plus(line.net_revenue, net_revenue, "net sales")?;
        line.cost = plus(line.cost, cost, "product value")?;
        line.profit = plus(line.profit, line_profit, "profit")?;
    }

    let mut products: Vec<ProductBreakdown> = lines.into_values().collect();
    products.sort_by(|a, b| {
        b.net_revenue
            .cmp(&a.net_revenue)
            .then_with(|| a.name.cmp(&b.name))
    });

    let net_sales = minus(gross_sales, returned_amount, "net sales")?;
    let profit = minus(net_sales, product_value, "profit")?;

    Ok(SalesReport {
        period,
        window,
        total_sales: net_sales,
        gross_sales,
        returned_amount,
        net_sales,
        product_value,
        profit,
        bill_count: u32::try_from(bills.len()).unwrap_or(u32::MAX),
        products,
        bills,
    })
}

fn times(amount: Money, quantity: i64, figure: &str) -> CoreResult<Money> {
    amount
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| CoreError::AmountOverflow(figure.to_string()))
}

fn plus(a: Money, b: Money, figure: &str) -> CoreResult<Money> {
    a.checked_add(b)
        .ok_or_else(|| CoreError::AmountOverflow(figure.to_string()))
}

fn minus(a: Money, b: Money, figure: &str) -> CoreResult<Money> {
    a.checked_sub(b)
        .ok_or_else(|| CoreError::AmountOverflow(figure.to_string()))
}

fn count(total: i64, quantity: i64) -> CoreResult<i64> {
    total
        .checked_add(quantity)
        .ok_or_else(|| CoreError::AmountOverflow("quantity".to_string()))
}

impl MonthlySnapshotInput {
    /// Month-end closing figures taken from a monthly report.
    pub fn from_report(report: &SalesReport) -> Self {
        MonthlySnapshotInput {
            total_sales: report.total_sales,
            total_profit: report.profit,
            total_returns: report.returned_amount,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BillItem, BillStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(product_id: Option<&str>, name: &str, qty: i64, returned: i64, price: i64, cost: i64) -> BillItem {
        BillItem {
            id: format!("{name}-{qty}"),
            bill_id: "b".to_string(),
            product_id: product_id.map(str::to_string),
            product_name: name.to_string(),
            quantity: qty,
            price_cents: price,
            purchase_price_cents: cost,
            total_cents: qty.saturating_mul(price),
            returned_quantity: returned,
            created_at: Utc::now(),
        }
    }

    fn bill(id: &str, items: Vec<BillItem>) -> Bill {
        let now = Utc::now();
        Bill {
            id: id.to_string(),
            customer_name: "Walk-in Customer".to_string(),
            total_amount_cents: items.iter().fold(0i64, |sum, i| sum.saturating_add(i.total_cents)),
            status: BillStatus::Paid,
            created_at: now,
            updated_at: now,
            items,
        }
    }

    fn window() -> ReportWindow {
        ReportWindow::for_date(date(2024, 1, 17), ReportPeriod::Daily).unwrap()
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("daily".parse::<ReportPeriod>().unwrap(), ReportPeriod::Daily);
        assert_eq!("Weekly".parse::<ReportPeriod>().unwrap(), ReportPeriod::Weekly);
        assert_eq!("monthly".parse::<ReportPeriod>().unwrap(), ReportPeriod::Monthly);
        assert!("yearly".parse::<ReportPeriod>().is_err());
    }

    #[test]
    fn test_daily_window() {
        let w = ReportWindow::for_date(date(2024, 3, 5), ReportPeriod::Daily).unwrap();
        assert_eq!(w.start, date(2024, 3, 5).and_hms_milli_opt(0, 0, 0, 0).unwrap());
        assert_eq!(w.end, date(2024, 3, 5).and_hms_milli_opt(23, 59, 59, 999).unwrap());
    }

    #[test]
    fn test_weekly_window_boundaries() {
        let w = ReportWindow::for_date(date(2024, 1, 17), ReportPeriod::Weekly).unwrap();
        assert_eq!(w.start.date(), date(2024, 1, 15));
        assert_eq!(w.end.date(), date(2024, 1, 21));

        assert!(w.contains(date(2024, 1, 21).and_hms_opt(23, 59, 0).unwrap()));
        assert!(!w.contains(date(2024, 1, 22).and_hms_opt(0, 0, 1).unwrap()));
        assert!(!w.contains(date(2024, 1, 14).and_hms_opt(23, 59, 59).unwrap()));
    }

    #[test]
    fn test_weekly_window_sunday_belongs_to_previous_week() {
        let w = ReportWindow::for_date(date(2024, 1, 21), ReportPeriod::Weekly).unwrap();
        assert_eq!(w.start.date(), date(2024, 1, 15));

        let w = ReportWindow::for_date(date(2024, 1, 15), ReportPeriod::Weekly).unwrap();
        assert_eq!(w.start.date(), date(2024, 1, 15));
    }

    #[test]
    fn test_monthly_window() {
        let w = ReportWindow::for_date(date(2024, 2, 10), ReportPeriod::Monthly).unwrap();
        assert_eq!(w.start.date(), date(2024, 2, 1));
        assert_eq!(w.end.date(), date(2024, 2, 29));

        let w = ReportWindow::for_date(date(2023, 12, 31), ReportPeriod::Monthly).unwrap();
        assert_eq!(w.start.date(), date(2023, 12, 1));
        assert_eq!(w.end.date(), date(2023, 12, 31));
    }

    #[test]
    fn test_to_utc_shifts_by_offset() {
        let w = window();
        let (start, _) = w.to_utc(FixedOffset::east_opt(5 * 3600).unwrap());
        assert_eq!(start.naive_utc(), date(2024, 1, 16).and_hms_opt(19, 0, 0).unwrap());

        let (start, end) = w.to_utc(FixedOffset::east_opt(0).unwrap());
        assert_eq!(start.naive_utc(), w.start);
        assert_eq!(end.naive_utc(), w.end);
    }

    #[test]
    fn test_pen_scenario() {
        // 10 pens at 10.00, cost 6.00, 4 returned
        let bills = vec![bill("b1", vec![item(Some("pen"), "Pen", 10, 4, 1000, 600)])];
        let report = aggregate(ReportPeriod::Daily, window(), bills, &HashMap::new()).unwrap();

        assert_eq!(report.gross_sales.cents(), 10_000);
        assert_eq!(report.returned_amount.cents(), 4_000);
        assert_eq!(report.net_sales.cents(), 6_000);
        assert_eq!(report.total_sales, report.net_sales);
        assert_eq!(report.product_value.cents(), 3_600);
        assert_eq!(report.profit.cents(), 2_400);
        assert_eq!(report.bill_count, 1);

        let line = &report.products[0];
        assert_eq!(line.net_quantity, 6);
        assert_eq!(line.cost.cents(), 3_600);
        assert_eq!(line.profit.cents(), 2_400);
    }

    #[test]
    fn test_cost_fallback() {
        let bills = vec![bill("b1", vec![item(Some("p1"), "Soap", 3, 1, 1000, 0)])];
        assert_eq!(missing_cost_product_ids(&bills), vec!["p1".to_string()]);

        let mut fallback = HashMap::new();
        fallback.insert("p1".to_string(), Money::from_cents(500));
        let report = aggregate(ReportPeriod::Daily, window(), bills.clone(), &fallback).unwrap();
        assert_eq!(report.product_value.cents(), 1_000);

        // Deleted product: no fallback entry, zero cost
        let report = aggregate(ReportPeriod::Daily, window(), bills, &HashMap::new()).unwrap();
        assert_eq!(report.product_value.cents(), 0);
        assert_eq!(report.profit.cents(), 2_000);
    }

    #[test]
    fn test_breakdown_grouping_and_order() {
        let bills = vec![
            bill(
                "b1",
                vec![
                    item(Some("pen"), "Pen", 2, 0, 1000, 600),
                    item(Some("ink"), "Ink", 1, 0, 5000, 3000),
                ],
            ),
            bill("b2", vec![item(Some("pen"), "Pen", 3, 1, 1000, 600)]),
            bill("b3", vec![item(None, "Loose item", 1, 0, 200, 100)]),
        ];
        let report = aggregate(ReportPeriod::Daily, window(), bills, &HashMap::new()).unwrap();

        let names: Vec<&str> = report.products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ink", "Pen", "Loose item"]);

        let pen = &report.products[1];
        assert_eq!(pen.quantity_sold, 5);
        assert_eq!(pen.quantity_returned, 1);
        assert_eq!(pen.net_revenue.cents(), 4_000);
        assert_eq!(pen.cost.cents(), 2_400);
    }

    #[test]
    fn test_empty_report() {
        let report = aggregate(ReportPeriod::Monthly, window(), vec![], &HashMap::new()).unwrap();
        assert!(report.total_sales.is_zero());
        assert!(report.profit.is_zero());
        assert!(report.products.is_empty());
    }

    #[test]
    fn test_oversized_line_is_an_error_not_a_panic() {
        let huge = 10_000_000_000;
        let bills = vec![bill("b1", vec![item(Some("pen"), "Pen", huge, 0, huge, 0)])];
        let err = aggregate(ReportPeriod::Daily, window(), bills, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow(_)));

        // Each line fits, the running total does not
        let max_line = i64::MAX / 2 + 1;
        let bills = vec![
            bill("b1", vec![item(Some("pen"), "Pen", 1, 0, max_line, 0)]),
            bill("b2", vec![item(Some("ink"), "Ink", 1, 0, max_line, 0)]),
        ];
        let err = aggregate(ReportPeriod::Daily, window(), bills, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow(_)));
    }

    #[test]
    fn test_snapshot_input_from_report() {
        let bills = vec![bill("b1", vec![item(Some("pen"), "Pen", 10, 4, 1000, 600)])];
        let report = aggregate(ReportPeriod::Monthly, window(), bills, &HashMap::new()).unwrap();
        let input = MonthlySnapshotInput::from_report(&report);
        assert_eq!(input.total_sales.cents(), 6_000);
        assert_eq!(input.total_profit.cents(), 2_400);
        assert_eq!(input.total_returns.cents(), 4_000);
    }
}
