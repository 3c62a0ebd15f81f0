//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures (wraps CoreError)             │
//! │                                                                         │
//! │  tally-app errors                                                      │
//! │  └── ApiError         - What the presentation layer sees               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Bill cannot be found.
    #[error("Bill not found: {0}")]
    BillNotFound(String),

    /// Bill item cannot be found.
    #[error("Bill item not found: {0}")]
    BillItemNotFound(String),

    /// Stock would go negative.
    ///
    /// ## When This Occurs
    /// - `adjust_stock` with a negative delta larger than current stock
    /// - `save_bill` under `StockPolicy::RejectNegative`
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Return quantity exceeds what is still outstanding on the line.
    #[error("Cannot return more than purchased: item {item_id} has {outstanding} outstanding, requested {requested}")]
    OverReturn {
        item_id: String,
        outstanding: i64,
        requested: i64,
    },

    /// Full return requested for a bill that is already fully returned.
    #[error("Bill already returned: {0}")]
    AlreadyReturned(String),

    /// A report total does not fit in the money range.
    #[error("Amount overflow while computing {0}")]
    AmountOverflow(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any transaction starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., non-numeric quantity, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: available 3, requested 5"
        );

        let err = CoreError::AlreadyReturned("b-1".to_string());
        assert_eq!(err.to_string(), "Bill already returned: b-1");
    }

    #[test]
    fn test_over_return_message() {
        let err = CoreError::OverReturn {
            item_id: "i-1".to_string(),
            outstanding: 2,
            requested: 3,
        };
        assert!(err.to_string().starts_with("Cannot return more than purchased"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
