//! # API Error Type
//!
//! Unified error type for commands, and the result envelope every command
//! answers with.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  {"command":"returnBillItem","args":{"itemId":"..","quantity":9}}      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function  →  Result<T, ApiError>                        │  │
//! │  │                                                                  │  │
//! │  │  DbError::Domain(CoreError::OverReturn{..}) ──► OVER_RETURN     │  │
//! │  │  DbError::QueryFailed(..)                   ──► DATABASE_ERROR  │  │
//! │  │  CoreError::Validation(..)                  ──► VALIDATION_ERROR│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  {"success":false,"error":"Cannot return more than ...",               │
//! │   "code":"OVER_RETURN"}                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage failures are logged with their detail and reported with a
//! generic message, except through [`ApiError::with_storage_detail`]
//! (checkout), which passes the storage error text on.

use serde::Serialize;
use tally_core::CoreError;
use tally_db::DbError;

/// API error returned from commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad or missing input
    ValidationError,

    /// Referenced product, bill or item does not exist
    NotFound,

    /// Stock would go below zero
    InsufficientStock,

    /// Return quantity exceeds what is outstanding
    OverReturn,

    /// Duplicate full return
    AlreadyReturned,

    /// Storage or transaction failure
    DatabaseError,

    /// Anything else
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Like `From<DbError>`, but a storage failure keeps its underlying
    /// message instead of the generic one.
    pub fn with_storage_detail(err: DbError) -> Self {
        match err {
            DbError::Domain(_) | DbError::NotFound { .. } | DbError::UniqueViolation { .. } => {
                ApiError::from(err)
            }
            other => {
                tracing::error!("Storage failure: {}", other);
                ApiError::new(ErrorCode::DatabaseError, other.to_string())
            }
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => ApiError::from(e),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::validation(format!(
                "{} '{}' already exists",
                field, value
            )),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ProductNotFound(_)
            | CoreError::BillNotFound(_)
            | CoreError::BillItemNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::OverReturn { .. } => ErrorCode::OverReturn,
            CoreError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::AmountOverflow(_) => ErrorCode::Internal,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<tally_core::ValidationError> for ApiError {
    fn from(err: tally_core::ValidationError) -> Self {
        ApiError::from(CoreError::Validation(err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Result Envelope
// =============================================================================

/// The uniform result shape.
///
/// ```json
/// { "success": true,  "data": { ... } }
/// { "success": false, "error": "Product not found: abc", "code": "NOT_FOUND" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error.message),
            code: Some(error.code),
        }
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => ApiResponse::err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_core_error_codes() {
        let err = ApiError::from(CoreError::OverReturn {
            item_id: "i".to_string(),
            outstanding: 2,
            requested: 3,
        });
        assert_eq!(err.code, ErrorCode::OverReturn);
        assert!(err.message.contains("2 outstanding"));

        let err = ApiError::from(DbError::Domain(CoreError::BillNotFound("b".to_string())));
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Bill not found: b");

        let err = ApiError::from(CoreError::AlreadyReturned("b".to_string()));
        assert_eq!(err.code, ErrorCode::AlreadyReturned);
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let err = ApiError::from(DbError::QueryFailed("no such column: secret".to_string()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("secret"));
    }

    #[test]
    fn test_storage_detail_keeps_message() {
        let err = ApiError::with_storage_detail(DbError::QueryFailed(
            "CHECK constraint failed: quantity > 0".to_string(),
        ));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Query failed: CHECK constraint failed: quantity > 0");

        let err = ApiError::with_storage_detail(DbError::Domain(CoreError::BillNotFound(
            "b".to_string(),
        )));
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(ApiResponse::ok(json!({"id": "p1"}))).unwrap();
        assert_eq!(ok, json!({"success": true, "data": {"id": "p1"}}));

        let err: ApiResponse<()> = ApiResponse::err(ApiError::not_found("Product", "p1"));
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({"success": false, "error": "Product not found: p1", "code": "NOT_FOUND"})
        );
    }

    #[test]
    fn test_void_success_has_null_data() {
        let ok = serde_json::to_value(ApiResponse::ok(())).unwrap();
        assert_eq!(ok, json!({"success": true, "data": null}));
    }
}
