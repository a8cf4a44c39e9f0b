//! # Accounting Period Repository
//!
//! Read access to accounting periods. Opening and closing periods belongs
//! to a different subsystem; the sale-commit path only needs to know which
//! period is open and whether the client's claimed period matches it.

use sqlx::SqlitePool;

use crate::error::DbResult;
use caja_core::AccountingPeriod;

/// Repository for accounting period lookups.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    pool: SqlitePool,
}

impl PeriodRepository {
    /// Creates a new PeriodRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PeriodRepository { pool }
    }

    /// Finds the currently open period for a store.
    ///
    /// The open/close subsystem keeps at most one open row per store; the
    /// `ORDER BY` is belt-and-braces against historical data that predates
    /// that rule.
    pub async fn find_open(&self, store_id: &str) -> DbResult<Option<AccountingPeriod>> {
        let period = sqlx::query_as::<_, AccountingPeriod>(
            r#"
            SELECT id, store_id, opened_at, closed_at
            FROM accounting_periods
            WHERE store_id = ?1 AND closed_at IS NULL
            ORDER BY opened_at DESC
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(period)
    }

    /// Gets a period by ID, scoped to a store.
    pub async fn get_by_id(
        &self,
        store_id: &str,
        period_id: &str,
    ) -> DbResult<Option<AccountingPeriod>> {
        let period = sqlx::query_as::<_, AccountingPeriod>(
            r#"
            SELECT id, store_id, opened_at, closed_at
            FROM accounting_periods
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(period_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(period)
    }
}
