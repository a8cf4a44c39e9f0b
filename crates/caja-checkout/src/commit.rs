//! # Sale Commit Orchestrator
//!
//! The one place a sale becomes durable.
//!
//! ## Commit Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  validate payload          ← pure, caja-core                           │
//! │       │                                                                 │
//! │  sync-key pre-check        ← pool read; duplicate? replay and stop     │
//! │       │                                                                 │
//! │  period validation         ← pool read; wrong period? reject           │
//! │       │                                                                 │
//! │  ╔═══ BEGIN TRANSACTION ═════════════════════════════════════════════╗ │
//! │  ║  resolve lines against stock rows   (ProductsNotFound)            ║ │
//! │  ║  decimal guard                      (DecimalNotAllowed)           ║ │
//! │  ║  plan bundle conversions            (ExcessiveBundleQuantity)     ║ │
//! │  ║  discount engine                    (failure swallowed)           ║ │
//! │  ║  insert sale                        (UNIQUE race → duplicate)     ║ │
//! │  ║  insert lines + applied discounts                                 ║ │
//! │  ║  execute conversions: downs, ups    (InsufficientBundleStock)     ║ │
//! │  ║  decrement stock + SALE movements   (InsufficientStock)           ║ │
//! │  ╚═══ COMMIT ════════════════════════════════════════════════════════╝ │
//! │       │                                                                 │
//! │  any error inside the block rolls back EVERYTHING: no sale row,        │
//! │  no lines, no movements, no stock change.                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use caja_core::{
    plan_conversions, validation::is_integral_quantity, validation::validate_sale,
    AppliedDiscount, CoreError, IncomingSale, Money, ResolvedSaleLine, Sale, SaleLine,
    SaleWithLines,
};
use caja_db::{Database, DbError, ExpandedSale};

use crate::discount::{resolve_totals, DiscountEngine, DiscountInput, DiscountLine};
use crate::error::{CommitError, CommitResult};
use crate::ledger;
use crate::period::validate_period;

/// Result of a commit: the durable sale, and whether this payload had
/// already been committed before.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub sale: SaleWithLines,
    pub duplicate: bool,
}

/// The sale commit engine.
///
/// Cheap to clone; one instance is shared across HTTP handlers.
#[derive(Clone)]
pub struct CheckoutEngine {
    db: Database,
    discounts: Arc<dyn DiscountEngine>,
}

impl CheckoutEngine {
    /// Creates an engine over a database and a discount engine.
    pub fn new(db: Database, discounts: Arc<dyn DiscountEngine>) -> Self {
        CheckoutEngine { db, discounts }
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Commits one sale payload atomically.
    ///
    /// Safe to call any number of times with the same payload: replays of
    /// an already-committed sync key return the stored sale with
    /// `duplicate = true` and touch nothing.
    pub async fn commit_sale(
        &self,
        store_id: &str,
        period_id: &str,
        user_id: &str,
        payload: &IncomingSale,
    ) -> CommitResult<CommitOutcome> {
        validate_sale(payload).map_err(CoreError::from)?;

        // Idempotency pre-check: the common duplicate case (client retry
        // after a lost response) never even opens a transaction.
        if let Some(existing) = self.db.sales().find_by_sync_key(&payload.sync_key).await? {
            info!(
                sync_key = %payload.sync_key,
                sale_id = %existing.sale.id,
                "Duplicate sync key, replaying committed sale"
            );
            return Ok(CommitOutcome {
                sale: existing,
                duplicate: true,
            });
        }

        let period = validate_period(&self.db.periods(), store_id, period_id).await?;

        let stock_repo = self.db.stock();
        let movement_repo = self.db.movements();
        let sale_repo = self.db.sales();

        let mut tx = self.db.begin().await?;

        // Resolve every line against its authoritative stock row. All
        // misses are collected so the client sees the full list at once.
        let mut resolved: Vec<ResolvedSaleLine> = Vec::with_capacity(payload.lines.len());
        let mut missing: Vec<String> = Vec::new();
        for line in &payload.lines {
            match stock_repo
                .get_with_product(&mut tx, store_id, &line.product_stock_id)
                .await?
            {
                Some((stock, product)) => resolved.push(ResolvedSaleLine {
                    stock,
                    product,
                    quantity: line.quantity,
                    requested_unit_price_cents: line.unit_price_cents,
                }),
                None => missing.push(
                    line.name
                        .clone()
                        .unwrap_or_else(|| line.product_stock_id.clone()),
                ),
            }
        }
        if !missing.is_empty() {
            return Err(CoreError::ProductsNotFound { items: missing }.into());
        }

        for line in &resolved {
            if !line.product.allows_decimal && !is_integral_quantity(line.quantity) {
                return Err(CoreError::DecimalNotAllowed {
                    product: line.display_name().to_string(),
                    quantity: line.quantity,
                }
                .into());
            }
        }

        let conversions = plan_conversions(&resolved)?;
        debug!(
            line_count = resolved.len(),
            conversions = conversions.len(),
            "Sale lines resolved"
        );

        let subtotal = resolved.iter().fold(Money::zero(), |acc, line| {
            acc + line.pricing_unit_price().multiply_quantity(line.quantity)
        });

        // Discounts are best-effort: a broken rule set must not block the
        // till, so failures are logged and the sale proceeds undiscounted.
        let discount_input = DiscountInput {
            store_id: store_id.to_string(),
            lines: resolved
                .iter()
                .map(|line| DiscountLine {
                    product_stock_id: line.stock.id.clone(),
                    product_id: line.product.id.clone(),
                    name: line.product.name.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.pricing_unit_price().cents(),
                })
                .collect(),
            subtotal_cents: subtotal.cents(),
            codes: payload.discount_codes.clone(),
        };
        let outcome = match self.discounts.compute(&mut tx, &discount_input).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(
                    error = %e,
                    sync_key = %payload.sync_key,
                    "Discount engine failed, committing sale undiscounted"
                );
                None
            }
        };
        let (total_cents, discount_total_cents) =
            resolve_totals(outcome.as_ref(), payload.total_cents);

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            user_id: user_id.to_string(),
            period_id: period.id.clone(),
            total_cents,
            cash_cents: payload.cash_cents,
            transfer_cents: payload.transfer_cents,
            discount_total_cents,
            sync_key: payload.sync_key.clone(),
            client_created_at: payload.client_created_at,
            was_offline: payload.was_offline,
            sync_attempts: payload.sync_attempts,
            transfer_destination_id: payload.transfer_destination_id.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = sale_repo.insert(&mut tx, &sale).await {
            if e.is_unique_violation("sync_key") {
                // Another request with the same key won the race since the
                // pre-check. Roll back and replay the winner's sale.
                drop(tx);
                if let Some(existing) =
                    sale_repo.find_by_sync_key(&payload.sync_key).await?
                {
                    info!(
                        sync_key = %payload.sync_key,
                        sale_id = %existing.sale.id,
                        "Lost sync-key race, replaying committed sale"
                    );
                    return Ok(CommitOutcome {
                        sale: existing,
                        duplicate: true,
                    });
                }
            }
            return Err(CommitError::Db(e));
        }

        let mut lines: Vec<SaleLine> = Vec::with_capacity(resolved.len());
        for line in &resolved {
            // Snapshot pattern: cost and price come from the stock row, the
            // client-supplied price never lands in a sale line.
            let row = SaleLine {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_stock_id: line.stock.id.clone(),
                quantity: line.quantity,
                unit_cost_cents: line.stock.unit_cost_cents,
                unit_price_cents: line.stock.unit_price_cents,
            };
            sale_repo.insert_line(&mut tx, &row).await?;
            lines.push(row);
        }

        if let Some(outcome) = &outcome {
            for rule in &outcome.applied {
                sale_repo
                    .insert_discount(
                        &mut tx,
                        &AppliedDiscount {
                            id: Uuid::new_v4().to_string(),
                            sale_id: sale.id.clone(),
                            rule_id: rule.rule_id.clone(),
                            amount_cents: rule.amount_cents,
                            detail: rule.detail.clone(),
                        },
                    )
                    .await?;
            }
        }

        ledger::execute_conversions(
            &stock_repo,
            &movement_repo,
            &mut tx,
            store_id,
            user_id,
            &sale.id,
            &conversions,
        )
        .await?;

        ledger::apply_sale_lines(
            &stock_repo,
            &movement_repo,
            &mut tx,
            store_id,
            user_id,
            &sale.id,
            &resolved,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale.id,
            store_id,
            total_cents,
            discount_total_cents,
            line_count = lines.len(),
            conversions = conversions.len(),
            "Sale committed"
        );

        Ok(CommitOutcome {
            sale: SaleWithLines { sale, lines },
            duplicate: false,
        })
    }

    /// Lists a period's sales with display names expanded.
    ///
    /// Unlike the commit path, closed periods are fine here: reporting
    /// reads history.
    pub async fn list_sales(
        &self,
        store_id: &str,
        period_id: &str,
    ) -> CommitResult<Vec<ExpandedSale>> {
        let period = self.db.periods().get_by_id(store_id, period_id).await?;
        if period.is_none() {
            return Err(CoreError::PeriodNotFound {
                period_id: period_id.to_string(),
            }
            .into());
        }

        Ok(self.db.sales().list_for_period(store_id, period_id).await?)
    }
}
