//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Bill       │   │    BillItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄ ─│  id (UUID)      │◄──│  bill_id (FK)   │       │
//! │  │  name           │ weak customer_name │   │  product_id ?   │       │
//! │  │  quantity       │   │  total_amount   │   │  name/price/cost│       │
//! │  │  price / cost   │   │  status         │   │  (frozen)       │       │
//! │  └─────────────────┘   └─────────────────┘   │  returned_qty   │       │
//! │                                               └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │ MonthlySnapshot │   │   BillStatus    │                             │
//! │  │  (month, year)  │   │  Paid           │                             │
//! │  │  sales/profit/  │   │  Partial        │                             │
//! │  │  returns        │   │  Returned       │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Historical Snapshot Pattern
//! A bill item owns a copy of the product's name, unit price and unit cost
//! as they were at sale time. The link back to the live product is only a
//! lookup key: deleting the product neither cascades into bills nor is
//! blocked by them.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation;

// =============================================================================
// Product
// =============================================================================

/// A product held in stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name. Unique by convention only.
    pub name: String,

    /// Units on hand. Kept >= 0 by the stock mutation paths.
    pub quantity: i64,

    /// Sale price in cents.
    pub price_cents: i64,

    /// Cost basis in cents. 0 on legacy records means "unknown".
    pub purchase_price_cents: i64,

    /// Manual price override in cents. 0 means "unset".
    pub manual_price_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost basis as Money.
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// Returns the manual override, if one is set.
    pub fn manual_price(&self) -> Option<Money> {
        (self.manual_price_cents > 0).then(|| Money::from_cents(self.manual_price_cents))
    }

    /// Price the billing screen charges: the manual override when set,
    /// otherwise the regular sale price.
    pub fn effective_price(&self) -> Money {
        self.manual_price().unwrap_or_else(|| self.price())
    }
}

/// Orders product names for listing: names that do not start with a digit
/// come first, case-insensitively alphabetical; names starting with a digit
/// follow, compared the same way among themselves.
///
/// The comparison is on lowercased code points, with an exact tie-break.
/// Accents are not folded: "Éclair" sorts after "Zebra", not beside
/// "Eclair".
pub fn compare_display_names(a: &str, b: &str) -> Ordering {
    let a_digit = starts_with_digit(a);
    let b_digit = starts_with_digit(b);

    match (a_digit, b_digit) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),
    }
}

/// Sorts products in listing order. See [`compare_display_names`].
pub fn sort_for_display(products: &mut [Product]) {
    products.sort_by(|a, b| compare_display_names(&a.name, &b.name));
}

fn starts_with_digit(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub quantity: i64,
    pub price: Money,
    /// Zero when the cost is unknown.
    #[serde(default)]
    pub purchase_price: Money,
}

impl NewProduct {
    /// Builds a product from raw form text.
    ///
    /// Name, quantity and price must be valid; the purchase price falls
    /// back to zero when absent or unparseable.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::NewProduct;
    ///
    /// let p = NewProduct::from_form("Pen", "100", "10", Some("oops")).unwrap();
    /// assert_eq!(p.quantity, 100);
    /// assert_eq!(p.purchase_price.cents(), 0);
    /// assert!(NewProduct::from_form("Pen", "lots", "10", None).is_err());
    /// ```
    pub fn from_form(
        name: &str,
        quantity: &str,
        price: &str,
        purchase_price: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let product = NewProduct {
            name: name.trim().to_string(),
            quantity: validation::parse_quantity(quantity)?,
            price: validation::parse_price(price)?,
            purchase_price: validation::parse_purchase_price(purchase_price),
        };
        product.validate()?;
        Ok(product)
    }

    /// Checks name, stock level and prices.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_product_name(&self.name)?;
        validation::validate_stock_quantity(self.quantity)?;
        validation::validate_price_cents(self.price.cents())?;
        validation::validate_price_cents(self.purchase_price.cents())?;
        Ok(())
    }
}

// =============================================================================
// Bill Status
// =============================================================================

/// Return state of a bill.
///
/// Every bill starts as `Paid`; the status only ever moves forward
/// (`Paid → Partial → Returned`, or `Paid → Returned`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    /// Sold, nothing returned.
    #[default]
    Paid,
    /// At least one unit returned, but not everything.
    Partial,
    /// Every unit on every line returned.
    Returned,
}

impl BillStatus {
    /// Storage representation, matching the `bills.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Paid => "paid",
            BillStatus::Partial => "partial",
            BillStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillStatus::Paid => write!(f, "PAID"),
            BillStatus::Partial => write!(f, "PARTIAL"),
            BillStatus::Returned => write!(f, "RETURNED"),
        }
    }
}

// =============================================================================
// Bill
// =============================================================================

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Bill {
    pub id: String,

    /// Customer name; "Walk-in Customer" when none was given.
    pub customer_name: String,

    /// Sale total as submitted by the caller. Never recomputed, never
    /// decremented on return: a point-in-time record, not a balance.
    pub total_amount_cents: i64,

    pub status: BillStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Line items, loaded eagerly by the repository.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<BillItem>,
}

impl Bill {
    /// Returns the recorded total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Sum of the item line totals (may differ from `total_amount`).
    pub fn items_total(&self) -> Money {
        self.items.iter().map(BillItem::total).sum()
    }
}

// =============================================================================
// Bill Item
// =============================================================================

/// One product line within a bill, with its own return tracking.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BillItem {
    pub id: String,
    pub bill_id: String,
    /// Lookup key to the live product; may dangle after a product delete.
    pub product_id: Option<String>,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Quantity sold.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub price_cents: i64,
    /// Unit cost in cents at time of sale (frozen). 0 = not captured.
    pub purchase_price_cents: i64,
    /// Line total as submitted (quantity × price).
    pub total_cents: i64,
    /// Units returned so far. 0 <= returned_quantity <= quantity.
    pub returned_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl BillItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Cost captured at sale time, or `None` when it was not captured.
    pub fn captured_cost(&self) -> Option<Money> {
        (self.purchase_price_cents != 0).then(|| Money::from_cents(self.purchase_price_cents))
    }

    /// Units sold and not yet returned.
    #[inline]
    pub fn outstanding_quantity(&self) -> i64 {
        (self.quantity - self.returned_quantity).max(0)
    }

    #[inline]
    pub fn is_fully_returned(&self) -> bool {
        self.returned_quantity >= self.quantity
    }
}

// =============================================================================
// Bill Input
// =============================================================================

/// A cart line submitted for billing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewBillItem {
    pub product_id: String,
    /// Name printed on the bill (copied, not looked up).
    pub name: String,
    pub quantity: i64,
    /// Unit price charged.
    pub price: Money,
    /// Line total as computed by the caller.
    pub total: Money,
}

/// A bill submitted by the billing screen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewBill {
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Trusted as given; not recomputed from items.
    pub total_amount: Money,
    pub items: Vec<NewBillItem>,
}

impl NewBill {
    /// Customer name to record, falling back to `fallback` when absent or blank.
    pub fn customer_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.customer_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => fallback,
        }
    }

    /// Distinct product ids referenced by the cart, in first-seen order.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id.clone());
            }
        }
        ids
    }
}

// =============================================================================
// Monthly Snapshot
// =============================================================================

/// A saved month-end closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MonthlySnapshot {
    pub id: String,
    /// 1-12.
    pub month: u32,
    pub year: i32,
    pub total_sales_cents: i64,
    pub total_profit_cents: i64,
    pub total_returns_cents: i64,
    /// Stamped on every (re-)save.
    #[ts(as = "String")]
    pub saved_at: DateTime<Utc>,
}

impl MonthlySnapshot {
    pub fn total_sales(&self) -> Money {
        Money::from_cents(self.total_sales_cents)
    }

    pub fn total_profit(&self) -> Money {
        Money::from_cents(self.total_profit_cents)
    }

    pub fn total_returns(&self) -> Money {
        Money::from_cents(self.total_returns_cents)
    }
}

/// Figures to store in a monthly snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MonthlySnapshotInput {
    pub total_sales: Money,
    pub total_profit: Money,
    pub total_returns: Money,
}

// =============================================================================
// Stock Policy
// =============================================================================

/// Whether saving a bill may drive product stock below zero.
///
/// The single-product stock adjustment always refuses to go negative;
/// this policy governs only the bulk decrement performed by bill saving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockPolicy {
    /// Sell regardless of stock on hand (negative inventory allowed).
    #[default]
    AllowNegative,
    /// Abort the bill when any line would take stock below zero.
    RejectNegative,
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockPolicy::AllowNegative => write!(f, "allow_negative"),
            StockPolicy::RejectNegative => write!(f, "reject_negative"),
        }
    }
}

impl std::str::FromStr for StockPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow_negative" | "allow" | "permissive" => Ok(StockPolicy::AllowNegative),
            "reject_negative" | "reject" | "strict" => Ok(StockPolicy::RejectNegative),
            _ => Err(ValidationError::NotAllowed {
                field: "stock_policy".to_string(),
                allowed: vec!["allow_negative".to_string(), "reject_negative".to_string()],
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
