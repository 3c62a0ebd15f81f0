//! # Snapshot Repository
//!
//! Month-end closings. One row per `(month, year)`; saving the same month
//! again overwrites the figures and `saved_at` but keeps the row's id.

use chrono::Utc;
use sqlx::SqlitePool;
use tally_core::validation::{validate_month, validate_year};
use tally_core::{LedgerEvent, MonthlySnapshot, MonthlySnapshotInput};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::events::EventBus;

/// Repository for monthly snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
    events: EventBus,
}

impl SnapshotRepository {
    /// Creates a new SnapshotRepository.
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        SnapshotRepository { pool, events }
    }

    /// Saves (or re-saves) the closing for a month.
    pub async fn save(
        &self,
        month: u32,
        year: i32,
        input: &MonthlySnapshotInput,
    ) -> DbResult<MonthlySnapshot> {
        validate_month(month)?;
        validate_year(year)?;
        debug!(month, year, sales = %input.total_sales, "Saving monthly snapshot");

        let snapshot = sqlx::query_as::<_, MonthlySnapshot>(
            r#"
            INSERT INTO monthly_snapshots (
                id, month, year, total_sales_cents, total_profit_cents,
                total_returns_cents, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (month, year) DO UPDATE SET
                total_sales_cents = excluded.total_sales_cents,
                total_profit_cents = excluded.total_profit_cents,
                total_returns_cents = excluded.total_returns_cents,
                saved_at = excluded.saved_at
            RETURNING
                id, month, year, total_sales_cents, total_profit_cents,
                total_returns_cents, saved_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(month)
        .bind(year)
        .bind(input.total_sales.cents())
        .bind(input.total_profit.cents())
        .bind(input.total_returns.cents())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(month, year, id = %snapshot.id, "Monthly snapshot saved");
        self.events
            .publish(LedgerEvent::SnapshotSaved { month, year });

        Ok(snapshot)
    }

    /// All snapshots, most recent month first.
    pub async fn list(&self) -> DbResult<Vec<MonthlySnapshot>> {
        let snapshots = sqlx::query_as::<_, MonthlySnapshot>(
            r#"
            SELECT id, month, year, total_sales_cents, total_profit_cents,
                   total_returns_cents, saved_at
            FROM monthly_snapshots
            ORDER BY year DESC, month DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }
}
