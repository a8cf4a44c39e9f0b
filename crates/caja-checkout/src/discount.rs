//! # Discount Engine Seam
//!
//! Pluggable discount computation for the sale commit.
//!
//! ## Failure Isolation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  commit_sale()                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  engine.compute(input)                                                 │
//! │       │                                                                 │
//! │       ├── Ok(outcome)  → sale total = outcome.final_total_cents        │
//! │       │                  discount rows written                          │
//! │       │                                                                 │
//! │       └── Err(e)       → tracing::warn!, sale proceeds with            │
//! │                          zero discount and total = max(0, client's)    │
//! │                                                                         │
//! │  A broken discount configuration must never block the till.            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use sqlx::SqliteConnection;
use thiserror::Error;

use caja_core::Money;
use caja_db::{Database, DbError, DiscountRuleRepository};

// =============================================================================
// Input / Outcome Types
// =============================================================================

/// One sale line as the discount engine sees it.
///
/// The unit price here follows the pricing rule (client price when present,
/// authoritative row price otherwise), so manual till overrides discount
/// correctly.
#[derive(Debug, Clone)]
pub struct DiscountLine {
    pub product_stock_id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
}

/// Everything the discount engine may consider.
#[derive(Debug, Clone)]
pub struct DiscountInput {
    pub store_id: String,
    pub lines: Vec<DiscountLine>,
    pub subtotal_cents: i64,
    /// Discount codes the client sent along with the sale.
    pub codes: Vec<String>,
}

/// One rule that fired.
#[derive(Debug, Clone)]
pub struct AppliedRule {
    pub rule_id: String,
    pub amount_cents: i64,
    /// Optional JSON description of how the amount was computed.
    pub detail: Option<String>,
}

/// The engine's verdict for one sale.
#[derive(Debug, Clone)]
pub struct DiscountOutcome {
    pub discount_total_cents: i64,
    /// Authoritative sale total after discounts.
    pub final_total_cents: i64,
    pub applied: Vec<AppliedRule>,
}

impl DiscountOutcome {
    /// An outcome that changes nothing.
    pub fn unchanged(subtotal_cents: i64) -> Self {
        DiscountOutcome {
            discount_total_cents: 0,
            final_total_cents: subtotal_cents,
            applied: Vec::new(),
        }
    }
}

/// Errors from a discount engine.
///
/// These are always swallowed by the commit orchestrator; the type exists
/// so engines can report *what* failed for the warning log.
#[derive(Debug, Error)]
pub enum DiscountError {
    #[error("discount rule lookup failed: {0}")]
    Lookup(#[from] DbError),

    #[error("discount engine failure: {0}")]
    Internal(String),
}

// =============================================================================
// The Seam
// =============================================================================

/// Computes discounts for a sale.
///
/// Implementations run on the commit transaction's connection so whatever
/// they read is consistent with the rest of the commit.
#[async_trait]
pub trait DiscountEngine: Send + Sync {
    async fn compute(
        &self,
        conn: &mut SqliteConnection,
        input: &DiscountInput,
    ) -> Result<DiscountOutcome, DiscountError>;
}

// =============================================================================
// Table-Backed Engine
// =============================================================================

/// The default engine: percentage rules from the `discount_rules` table.
///
/// ## Rule Semantics
/// - Inactive rules never fire
/// - A rule with a code fires only when the client sent that code
///   (case-insensitive match)
/// - A rule fires only when the subtotal reaches `min_subtotal_cents`
/// - Each firing rule deducts `percent_bps` of the subtotal; amounts stack
#[derive(Debug, Clone)]
pub struct TableDiscountEngine {
    rules: DiscountRuleRepository,
}

impl TableDiscountEngine {
    /// Creates the engine on top of a database handle.
    pub fn new(db: &Database) -> Self {
        TableDiscountEngine {
            rules: db.discounts(),
        }
    }
}

#[async_trait]
impl DiscountEngine for TableDiscountEngine {
    async fn compute(
        &self,
        conn: &mut SqliteConnection,
        input: &DiscountInput,
    ) -> Result<DiscountOutcome, DiscountError> {
        let rules = self.rules.list_active(conn, &input.store_id).await?;

        let subtotal = Money::from_cents(input.subtotal_cents);
        let mut total_discount = Money::zero();
        let mut applied = Vec::new();

        for rule in rules {
            if let Some(code) = &rule.code {
                let sent = input.codes.iter().any(|c| c.eq_ignore_ascii_case(code));
                if !sent {
                    continue;
                }
            }

            if input.subtotal_cents < rule.min_subtotal_cents {
                continue;
            }

            let bps = rule.percent_bps.clamp(0, 10_000) as u32;
            let amount = subtotal.percentage_bps(bps);
            if amount.is_zero() {
                continue;
            }

            let detail = serde_json::json!({
                "rule": rule.name,
                "percent_bps": bps,
                "subtotal_cents": input.subtotal_cents,
            })
            .to_string();

            total_discount += amount;
            applied.push(AppliedRule {
                rule_id: rule.id,
                amount_cents: amount.cents(),
                detail: Some(detail),
            });
        }

        let final_total = (subtotal - total_discount).clamp_non_negative();

        Ok(DiscountOutcome {
            discount_total_cents: total_discount.cents(),
            final_total_cents: final_total.cents(),
            applied,
        })
    }
}

// =============================================================================
// Total Resolution
// =============================================================================

/// Resolves the sale total and discount from the engine's verdict.
///
/// When the engine ran, its `final_total_cents` is authoritative and the
/// client-computed total is ignored entirely. When it failed, the sale
/// falls back to the client total clamped to non-negative.
pub fn resolve_totals(
    outcome: Option<&DiscountOutcome>,
    client_total_cents: i64,
) -> (i64, i64) {
    match outcome {
        Some(o) => (o.final_total_cents, o.discount_total_cents),
        None => (client_total_cents.max(0), 0),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
