//! # Repository Module
//!
//! Database repository implementations for the Tally ledger.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Command bridge                                                        │
//! │       │  db.returns().return_bill_item(item_id, 4)                     │
//! │       ▼                                                                 │
//! │  ReturnRepository ──┐                                                  │
//! │  BillRepository  ───┼── shared helpers: fetch_bill, attach_items,      │
//! │  ReportRepository ──┘                   fetch_purchase_prices          │
//! │       │                                                                 │
//! │       │  one transaction per mutating call                             │
//! │       ▼                                                                 │
//! │  SQLite Database  ──► commit ──► EventBus::publish                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product store and stock adjustment
//! - [`BillRepository`](bill::BillRepository) - Checkout, bill history, rename
//! - [`ReturnRepository`](returns::ReturnRepository) - Full/line returns, bill deletion
//! - [`ReportRepository`](report::ReportRepository) - Sales and profit reports
//! - [`SnapshotRepository`](snapshot::SnapshotRepository) - Month-end closings

pub mod bill;
pub mod product;
pub mod report;
pub mod returns;
pub mod snapshot;
