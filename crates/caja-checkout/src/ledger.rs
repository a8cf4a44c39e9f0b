//! # Inventory Execution
//!
//! The I/O half of bundle desegregation plus the per-line sale decrements,
//! all inside the commit transaction.
//!
//! ## Conservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Selling 5 cans with 2 loose on hand (six-pack bundles: 3)             │
//! │                                                                         │
//! │  Step                      six-pack   cans    ledger entry             │
//! │  ───────────────────────   ────────   ─────   ─────────────────────    │
//! │  start                         3        2                               │
//! │  DOWN  (one bundle out)        2        2     BUNDLE_SPLIT_DOWN, b=3   │
//! │  UP    (+units_per_bundle)     2        8     BUNDLE_SPLIT_UP,   b=2   │
//! │  SALE  (-5)                    2        3     SALE,              b=8   │
//! │                                                                         │
//! │  Can-equivalents: 3·6+2 = 20 → 2·6+8 = 20 → 2·6+3 = 17 (5 sold)        │
//! │  Every step's quantity_before snapshot makes the ledger replayable.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All down-conversions run before any up-conversion, so a sale that needs
//! two splits fails cleanly before any loose stock is topped up when the
//! second bundle is missing.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use caja_core::{BundleConversion, CoreError, MovementKind, ResolvedSaleLine, StockMovement};
use caja_db::{MovementRepository, StockRepository};

use crate::error::CommitResult;

/// Tolerance for on-hand comparisons; absorbs f64 decoding noise on
/// decimal-quantity products.
pub(crate) const QTY_EPSILON: f64 = 1e-9;

/// Executes planned bundle conversions: all downs, then all ups.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn execute_conversions(
    stock: &StockRepository,
    movements: &MovementRepository,
    conn: &mut SqliteConnection,
    store_id: &str,
    user_id: &str,
    sale_id: &str,
    conversions: &[BundleConversion],
) -> CommitResult<()> {
    // Phase 1: remove one bundle per conversion from the store's own rows.
    for conversion in conversions {
        let parent = stock
            .find_store_own_row(conn, store_id, &conversion.parent_product_id)
            .await?;

        let parent = match parent {
            Some(p) if p.quantity + QTY_EPSILON >= 1.0 => p,
            _ => {
                return Err(CoreError::InsufficientBundleStock {
                    product: conversion.loose_product_name.clone(),
                }
                .into());
            }
        };

        debug!(
            parent_stock_id = %parent.id,
            loose_product_id = %conversion.loose_product_id,
            "Breaking one bundle"
        );

        movements
            .append(
                conn,
                &StockMovement {
                    id: Uuid::new_v4().to_string(),
                    kind: MovementKind::BundleSplitDown,
                    quantity: 1.0,
                    product_stock_id: parent.id.clone(),
                    store_id: store_id.to_string(),
                    user_id: user_id.to_string(),
                    quantity_before: parent.quantity,
                    sale_id: Some(sale_id.to_string()),
                    reason: Some(format!(
                        "Bundle split for {}",
                        conversion.loose_product_name
                    )),
                    supplier_id: None,
                    created_at: Utc::now(),
                },
            )
            .await?;

        stock.adjust_quantity(conn, &parent.id, -1.0).await?;
    }

    // Phase 2: top up the store's own loose rows. Bundle contents belong
    // to the store, so a consignment row for the same product is never
    // credited.
    for conversion in conversions {
        let loose = stock
            .find_store_own_row(conn, store_id, &conversion.loose_product_id)
            .await?
            .ok_or_else(|| {
                caja_db::DbError::not_found("ProductStock", &conversion.loose_product_id)
            })?;

        let units = conversion.units_per_bundle as f64;

        movements
            .append(
                conn,
                &StockMovement {
                    id: Uuid::new_v4().to_string(),
                    kind: MovementKind::BundleSplitUp,
                    quantity: units,
                    product_stock_id: loose.id.clone(),
                    store_id: store_id.to_string(),
                    user_id: user_id.to_string(),
                    quantity_before: loose.quantity,
                    sale_id: Some(sale_id.to_string()),
                    reason: Some(format!(
                        "Bundle split for {}",
                        conversion.loose_product_name
                    )),
                    supplier_id: loose.supplier_id.clone(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        stock.adjust_quantity(conn, &loose.id, units).await?;
    }

    Ok(())
}

/// Validates and applies the per-line stock decrements with SALE ledger
/// entries.
///
/// Each row is re-read inside the transaction, so a line that was short at
/// resolution time but topped up by a conversion passes here.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn apply_sale_lines(
    stock: &StockRepository,
    movements: &MovementRepository,
    conn: &mut SqliteConnection,
    store_id: &str,
    user_id: &str,
    sale_id: &str,
    lines: &[ResolvedSaleLine],
) -> CommitResult<()> {
    for line in lines {
        let current = stock
            .get(conn, &line.stock.id)
            .await?
            .ok_or_else(|| caja_db::DbError::not_found("ProductStock", &line.stock.id))?;

        if current.quantity + QTY_EPSILON < line.quantity {
            return Err(CoreError::InsufficientStock {
                product: line.display_name().to_string(),
                available: current.quantity,
                requested: line.quantity,
            }
            .into());
        }

        movements
            .append(
                conn,
                &StockMovement {
                    id: Uuid::new_v4().to_string(),
                    kind: MovementKind::Sale,
                    quantity: line.quantity,
                    product_stock_id: current.id.clone(),
                    store_id: store_id.to_string(),
                    user_id: user_id.to_string(),
                    quantity_before: current.quantity,
                    sale_id: Some(sale_id.to_string()),
                    reason: None,
                    // Consignment passthrough: settlement reporting separates
                    // consigned sales from owned sales by this field.
                    supplier_id: current.supplier_id.clone(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        stock.adjust_quantity(conn, &current.id, -line.quantity).await?;
    }

    Ok(())
}
