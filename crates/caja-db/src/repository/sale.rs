//! # Sale Repository
//!
//! Database operations for sales, sale lines and applied discounts.
//!
//! ## Two Access Patterns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  POOL READS (standalone)                                               │
//! │  ├── find_by_sync_key()   ← idempotency pre-check + duplicate replay   │
//! │  └── list_for_period()    ← period listing with names expanded         │
//! │                                                                         │
//! │  TRANSACTION WRITES (conn: &mut SqliteConnection)                      │
//! │  ├── insert()             ← the sale row; UNIQUE sync_key backstop     │
//! │  ├── insert_line()        ← one row per product, snapshot cost/price   │
//! │  └── insert_discount()    ← zero-to-many applied discount records      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use caja_core::{AppliedDiscount, Sale, SaleLine, SaleWithLines};

// =============================================================================
// Expanded Listing Rows
// =============================================================================

/// One sale line with display names joined in, for the period listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpandedSaleLine {
    pub id: String,
    pub product_stock_id: String,
    pub product_name: String,
    pub quantity: f64,
    pub unit_cost_cents: i64,
    pub unit_price_cents: i64,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
}

/// One applied discount with the rule name joined in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpandedAppliedDiscount {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub amount_cents: i64,
    pub detail: Option<String>,
}

/// A sale expanded with operator, destination, line and discount names.
///
/// This is the GET listing shape; the reporting client renders it without
/// further lookups.
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedSale {
    #[serde(flatten)]
    pub sale: Sale,
    pub operator_name: Option<String>,
    pub transfer_destination_name: Option<String>,
    pub lines: Vec<ExpandedSaleLine>,
    pub discounts: Vec<ExpandedAppliedDiscount>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

const SALE_COLUMNS: &str = r#"
    id, store_id, user_id, period_id,
    total_cents, cash_cents, transfer_cents, discount_total_cents,
    sync_key, client_created_at, was_offline, sync_attempts,
    transfer_destination_id, created_at
"#;

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Finds a sale (with lines) by its client sync key.
    ///
    /// This is both the idempotency pre-check and the duplicate-replay
    /// lookup: when a payload arrives whose sync key already committed,
    /// the existing sale is returned to the client unchanged.
    pub async fn find_by_sync_key(&self, sync_key: &str) -> DbResult<Option<SaleWithLines>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE sync_key = ?1"
        ))
        .bind(sync_key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(sale) = sale else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT id, sale_id, product_stock_id, quantity,
                   unit_cost_cents, unit_price_cents
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(&sale.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(SaleWithLines { sale, lines }))
    }

    /// Inserts the sale row inside the caller's transaction.
    ///
    /// A UNIQUE violation on `sync_key` here means another request with the
    /// same key won the race since the pre-check; the orchestrator maps
    /// that into the duplicate success path instead of an error.
    pub async fn insert(&self, conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, sync_key = %sale.sync_key, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, store_id, user_id, period_id,
                total_cents, cash_cents, transfer_cents, discount_total_cents,
                sync_key, client_created_at, was_offline, sync_attempts,
                transfer_destination_id, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.store_id)
        .bind(&sale.user_id)
        .bind(&sale.period_id)
        .bind(sale.total_cents)
        .bind(sale.cash_cents)
        .bind(sale.transfer_cents)
        .bind(sale.discount_total_cents)
        .bind(&sale.sync_key)
        .bind(sale.client_created_at)
        .bind(sale.was_offline)
        .bind(sale.sync_attempts)
        .bind(&sale.transfer_destination_id)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one sale line inside the caller's transaction.
    ///
    /// ## Snapshot Pattern
    /// Cost and price come from the authoritative stock row at commit time.
    /// This preserves sale history even when store prices change later.
    pub async fn insert_line(&self, conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
        debug!(sale_id = %line.sale_id, stock_id = %line.product_stock_id, "Inserting sale line");

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_stock_id, quantity,
                unit_cost_cents, unit_price_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_stock_id)
        .bind(line.quantity)
        .bind(line.unit_cost_cents)
        .bind(line.unit_price_cents)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one applied discount record inside the caller's transaction.
    pub async fn insert_discount(
        &self,
        conn: &mut SqliteConnection,
        discount: &AppliedDiscount,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO applied_discounts (id, sale_id, rule_id, amount_cents, detail)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.sale_id)
        .bind(&discount.rule_id)
        .bind(discount.amount_cents)
        .bind(&discount.detail)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Lists all sales of one period, expanded with display names.
    ///
    /// One query for the sales, then per-sale queries for lines and
    /// discounts. Period listings are small (one trading day), so the
    /// fan-out is acceptable and keeps each query trivial.
    pub async fn list_for_period(
        &self,
        store_id: &str,
        period_id: &str,
    ) -> DbResult<Vec<ExpandedSale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE store_id = ?1 AND period_id = ?2
            ORDER BY created_at ASC, rowid ASC
            "#
        ))
        .bind(store_id)
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        let mut expanded = Vec::with_capacity(sales.len());
        for sale in sales {
            let operator_name: Option<String> =
                sqlx::query_scalar("SELECT name FROM users WHERE id = ?1")
                    .bind(&sale.user_id)
                    .fetch_optional(&self.pool)
                    .await?;

            let transfer_destination_name: Option<String> = match &sale.transfer_destination_id {
                Some(dest_id) => {
                    sqlx::query_scalar("SELECT name FROM transfer_destinations WHERE id = ?1")
                        .bind(dest_id)
                        .fetch_optional(&self.pool)
                        .await?
                }
                None => None,
            };

            let lines = sqlx::query_as::<_, ExpandedSaleLine>(
                r#"
                SELECT
                    sl.id, sl.product_stock_id, cp.name AS product_name,
                    sl.quantity, sl.unit_cost_cents, sl.unit_price_cents,
                    ps.supplier_id, su.name AS supplier_name
                FROM sale_lines sl
                JOIN product_stocks ps ON ps.id = sl.product_stock_id
                JOIN catalog_products cp ON cp.id = ps.product_id
                LEFT JOIN suppliers su ON su.id = ps.supplier_id
                WHERE sl.sale_id = ?1
                ORDER BY sl.rowid ASC
                "#,
            )
            .bind(&sale.id)
            .fetch_all(&self.pool)
            .await?;

            let discounts = sqlx::query_as::<_, ExpandedAppliedDiscount>(
                r#"
                SELECT
                    ad.id, ad.rule_id, dr.name AS rule_name,
                    ad.amount_cents, ad.detail
                FROM applied_discounts ad
                JOIN discount_rules dr ON dr.id = ad.rule_id
                WHERE ad.sale_id = ?1
                ORDER BY ad.rowid ASC
                "#,
            )
            .bind(&sale.id)
            .fetch_all(&self.pool)
            .await?;

            expanded.push(ExpandedSale {
                sale,
                operator_name,
                transfer_destination_name,
                lines,
                discounts,
            });
        }

        Ok(expanded)
    }
}
