//! # tally-core: Pure Business Logic for the Tally Shop Ledger
//!
//! This crate is the **heart** of Tally. It contains the ledger's business
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Presentation layer (forms, lists, export)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON commands                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-app (operation surface)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │  report   │  │   │
//! │  │   │  Product  │  │   Money   │  │BillStatus │  │  Window   │  │   │
//! │  │   │  Bill     │  │  parsing  │  │ recompute │  │ Aggregate │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │          SQLite queries, migrations, transactional ledger       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Bill, BillItem, MonthlySnapshot)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`ledger`] - Bill status machine and return arithmetic
//! - [`report`] - Report windows and sales/profit aggregation
//! - [`events`] - Notifications emitted after successful mutations
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::parse_decimal("10.50").unwrap();
//! assert_eq!(price.cents(), 1050);
//! assert_eq!((price * 3).cents(), 3150);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod ledger;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use events::LedgerEvent;
pub use money::Money;
pub use report::{ProductBreakdown, ReportPeriod, ReportWindow, SalesReport};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Customer name recorded when a bill is saved without one.
pub const WALK_IN_CUSTOMER: &str = "Walk-in Customer";

/// Number of bills returned by the recent-bills listing.
pub const RECENT_BILLS_LIMIT: u32 = 50;
