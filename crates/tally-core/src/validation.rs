//! # Validation Module
//!
//! Input validation and form-text parsing for Tally.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation (forms)                                         │
//! │  ├── Raw text fields: "12", "10.5"                                     │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Operation surface (tally-app)                                │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: parsing + business rule validation                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE(month, year) on snapshots                                  │
//! │  └── Conditional UPDATEs for stock and returns                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{parse_quantity, parse_price};
//!
//! assert_eq!(parse_quantity("12").unwrap(), 12);
//! assert_eq!(parse_price("10.5").unwrap().cents(), 1050);
//! assert!(parse_quantity("twelve").is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::NewBill;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted product or customer name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Largest stock level, stock adjustment or bill line quantity.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest unit price in cents (ten million in major units).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty (after trimming)
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Pen").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Validates a customer name given when renaming a bill.
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    validate_name("customer_name", name)
}

fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates an entity id: non-empty after trimming.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Form Text Parsing
// =============================================================================

/// Parses a whole-number quantity typed into a form.
///
/// Surrounding whitespace is ignored; anything else that is not an integer
/// (including `"12abc"` and `"1.5"`) is rejected.
pub fn parse_quantity(input: &str) -> ValidationResult<i64> {
    input
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: format!("'{}' is not a whole number", input.trim()),
        })
}

/// Parses a sale price typed into a form. Must be a non-negative decimal
/// with at most two fractional digits.
pub fn parse_price(input: &str) -> ValidationResult<Money> {
    let price = Money::parse_decimal(input).ok_or_else(|| ValidationError::InvalidFormat {
        field: "price".to_string(),
        reason: format!("'{}' is not a valid amount", input.trim()),
    })?;
    validate_price_cents(price.cents())?;
    Ok(price)
}

/// Parses an optional purchase price.
///
/// Lenient by contract: absent, blank, unparseable or negative input
/// yields zero ("cost unknown") instead of an error.
pub fn parse_purchase_price(input: Option<&str>) -> Money {
    input
        .and_then(Money::parse_decimal)
        .filter(|m| !m.is_negative())
        .unwrap_or_default()
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an absolute stock level (create, set quantity).
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - At most `MAX_QUANTITY`
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a signed stock adjustment. Its magnitude is bounded by
/// `MAX_QUANTITY`.
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if !(-MAX_QUANTITY..=MAX_QUANTITY).contains(&delta) {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_QUANTITY,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a price in cents. Zero is allowed; the ceiling is
/// `MAX_PRICE_CENTS`.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// assert!(validate_price_cents(i64::MAX).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates the number of units in a single return request.
pub fn validate_return_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "return quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a calendar month (1-12).
pub fn validate_month(month: u32) -> ValidationResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        });
    }
    Ok(())
}

/// Validates a snapshot year.
pub fn validate_year(year: i32) -> ValidationResult<()> {
    if !(1970..=9999).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 1970,
            max: 9999,
        });
    }
    Ok(())
}

// =============================================================================
// Bill Validators
// =============================================================================

/// Validates a submitted bill before the save transaction starts.
///
/// ## Rules
/// - At least one item
/// - Every item references a product and sells 1..=`MAX_QUANTITY` units
/// - Prices within 0..=`MAX_PRICE_CENTS`; no negative totals
///
/// The submitted totals are not cross-checked against quantity × price.
pub fn validate_new_bill(bill: &NewBill) -> ValidationResult<()> {
    if bill.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if bill.total_amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "total_amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if let Some(name) = bill.customer_name.as_deref() {
        if name.trim().chars().count() > MAX_NAME_LENGTH {
            return Err(ValidationError::TooLong {
                field: "customer_name".to_string(),
                max: MAX_NAME_LENGTH,
            });
        }
    }

    for item in &bill.items {
        validate_id("product_id", &item.product_id)?;

        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }

        if item.quantity > MAX_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_QUANTITY,
            });
        }

        validate_price_cents(item.price.cents())?;

        if item.total.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "total".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
