//! # Stock Repository
//!
//! Database operations on per-store stock rows.
//!
//! ## Decrement Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every quantity change inside a sale commit follows the same shape:    │
//! │                                                                         │
//! │    1. get(conn, id)                ← re-read inside the transaction     │
//! │    2. validate against on-hand     ← business rule in caja-checkout    │
//! │    3. adjust_quantity(conn, id, Δ) ← relative UPDATE, never SET = x    │
//! │    4. movements().append(...)      ← ledger entry with before-snapshot │
//! │                                                                         │
//! │  The relative UPDATE means a concurrent restock committed between      │
//! │  steps never gets overwritten.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use caja_core::{CatalogProduct, ProductStock};

/// Flat row for the stock + catalog product join.
#[derive(Debug, sqlx::FromRow)]
struct StockedProductRow {
    id: String,
    store_id: String,
    product_id: String,
    quantity: f64,
    unit_cost_cents: i64,
    unit_price_cents: i64,
    supplier_id: Option<String>,
    product_name: String,
    allows_decimal: bool,
    fraction_of_id: Option<String>,
    units_per_bundle: Option<i64>,
}

impl StockedProductRow {
    fn split(self) -> (ProductStock, CatalogProduct) {
        let product = CatalogProduct {
            id: self.product_id.clone(),
            name: self.product_name,
            allows_decimal: self.allows_decimal,
            fraction_of_id: self.fraction_of_id,
            units_per_bundle: self.units_per_bundle,
        };
        let stock = ProductStock {
            id: self.id,
            store_id: self.store_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_cost_cents: self.unit_cost_cents,
            unit_price_cents: self.unit_price_cents,
            supplier_id: self.supplier_id,
        };
        (stock, product)
    }
}

/// Repository for product stock operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Reads a stock row outside any transaction.
    ///
    /// For diagnostics and post-commit verification; commit-path reads go
    /// through [`StockRepository::get`] on the transaction connection.
    pub async fn get_by_id(&self, stock_id: &str) -> DbResult<Option<ProductStock>> {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT id, store_id, product_id, quantity,
                   unit_cost_cents, unit_price_cents, supplier_id
            FROM product_stocks
            WHERE id = ?1
            "#,
        )
        .bind(stock_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    /// Gets a stock row with its catalog product, scoped to a store.
    ///
    /// Returns None when the row doesn't exist or belongs to another store;
    /// the caller treats both the same way (product not found).
    pub async fn get_with_product(
        &self,
        conn: &mut SqliteConnection,
        store_id: &str,
        stock_id: &str,
    ) -> DbResult<Option<(ProductStock, CatalogProduct)>> {
        let row = sqlx::query_as::<_, StockedProductRow>(
            r#"
            SELECT
                ps.id, ps.store_id, ps.product_id, ps.quantity,
                ps.unit_cost_cents, ps.unit_price_cents, ps.supplier_id,
                cp.name AS product_name, cp.allows_decimal,
                cp.fraction_of_id, cp.units_per_bundle
            FROM product_stocks ps
            JOIN catalog_products cp ON cp.id = ps.product_id
            WHERE ps.id = ?1 AND ps.store_id = ?2
            "#,
        )
        .bind(stock_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(StockedProductRow::split))
    }

    /// Re-reads a stock row inside the transaction.
    pub async fn get(
        &self,
        conn: &mut SqliteConnection,
        stock_id: &str,
    ) -> DbResult<Option<ProductStock>> {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT id, store_id, product_id, quantity,
                   unit_cost_cents, unit_price_cents, supplier_id
            FROM product_stocks
            WHERE id = ?1
            "#,
        )
        .bind(stock_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(stock)
    }

    /// Finds the store's OWN stock row for a catalog product.
    ///
    /// Own means `supplier_id IS NULL`. Bundle desegregation only breaks
    /// bundles the store owns, never consignment stock.
    pub async fn find_store_own_row(
        &self,
        conn: &mut SqliteConnection,
        store_id: &str,
        product_id: &str,
    ) -> DbResult<Option<ProductStock>> {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT id, store_id, product_id, quantity,
                   unit_cost_cents, unit_price_cents, supplier_id
            FROM product_stocks
            WHERE store_id = ?1 AND product_id = ?2 AND supplier_id IS NULL
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(stock)
    }

    /// Applies a relative quantity change to a stock row.
    ///
    /// Positive delta adds stock, negative removes. The caller validates
    /// on-hand quantity first; this method never checks.
    pub async fn adjust_quantity(
        &self,
        conn: &mut SqliteConnection,
        stock_id: &str,
        delta: f64,
    ) -> DbResult<()> {
        sqlx::query("UPDATE product_stocks SET quantity = quantity + ?1 WHERE id = ?2")
            .bind(delta)
            .bind(stock_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
