//! # tally-db: Database Layer for Tally
//!
//! Persistent state of the shop ledger: products, bills with their items,
//! and monthly snapshots, in SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  tally-app command (saveBill)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ BillRepo      │    │ 001_initial  │  │   │
//! │  │   │ EventBus      │    │ ReturnRepo    │    │  _schema.sql │  │   │
//! │  │   │ StockPolicy   │    │ ReportRepo    │    │              │  │   │
//! │  │   │               │    │ SnapshotRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/tally/tally.db                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`events`] - Ledger change notifications
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//!
//! let mut changes = db.subscribe();
//! let bill = db.bills().save_bill(&cart).await?;
//! let report = db.reports().sales_report(today, ReportPeriod::Daily, offset).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use events::{EventBus, EventReceiver};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::bill::BillRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::returns::ReturnRepository;
pub use repository::snapshot::SnapshotRepository;
