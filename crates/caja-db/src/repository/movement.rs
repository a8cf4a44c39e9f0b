//! # Stock Movement Repository
//!
//! Append-only access to the stock movement ledger. There is deliberately
//! no update or delete here: downstream reporting reconstructs stock
//! history from this table, so rows are immutable once written.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use caja_core::StockMovement;

/// Repository for the stock movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends one ledger entry inside the caller's transaction.
    pub async fn append(
        &self,
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> DbResult<()> {
        debug!(
            id = %movement.id,
            kind = ?movement.kind,
            stock_id = %movement.product_stock_id,
            quantity = movement.quantity,
            quantity_before = movement.quantity_before,
            "Appending stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, kind, quantity, product_stock_id, store_id, user_id,
                quantity_before, sale_id, reason, supplier_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&movement.id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(&movement.product_stock_id)
        .bind(&movement.store_id)
        .bind(&movement.user_id)
        .bind(movement.quantity_before)
        .bind(&movement.sale_id)
        .bind(&movement.reason)
        .bind(&movement.supplier_id)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Lists ledger entries for one sale in insertion order.
    ///
    /// Used by tests and by support tooling to audit what a commit did.
    /// Ordering by rowid preserves write order even when timestamps tie.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, kind, quantity, product_stock_id, store_id, user_id,
                   quantity_before, sale_id, reason, supplier_id, created_at
            FROM stock_movements
            WHERE sale_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}
