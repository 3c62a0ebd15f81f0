//! # Application State
//!
//! Everything a command needs: the database handle and the report
//! wall-clock offset. Read-only after startup.
//!
//! The `Database` from `tally-db` wraps a `SqlitePool`, so commands can run
//! concurrently without explicit locking.

use chrono::FixedOffset;
use tally_db::Database;
use tracing::info;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct AppState {
    db: Database,
    report_offset: FixedOffset,
}

impl AppState {
    pub fn new(db: Database, report_offset: FixedOffset) -> Self {
        AppState { db, report_offset }
    }

    /// Opens the configured database (running migrations).
    pub async fn open(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_config = config.db_config()?;
        info!(path = ?db_config.database_path, policy = %db_config.stock_policy, "Opening database");

        let db = Database::new(db_config).await?;
        Ok(AppState::new(db, config.report_offset()?))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn report_offset(&self) -> FixedOffset {
        self.report_offset
    }
}
