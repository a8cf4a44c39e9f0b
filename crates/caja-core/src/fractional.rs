//! # Fractional Product Planning
//!
//! Pure planning half of bundle desegregation ("breaking a case").
//!
//! ## The Problem
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A store sells both a six-pack (bundle) and single cans (loose          │
//! │  variant, fraction_of_id → six-pack, units_per_bundle = 6).             │
//! │                                                                         │
//! │  Request: 5 single cans          Loose on-hand: 2    Bundles: 3        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  5 < 6            → passes the bundle-quantity guard                   │
//! │  5 > 2 on-hand    → needs desegregation                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DOWN: six-pack 3 → 2   (ledger: BUNDLE_SPLIT_DOWN, before = 3)        │
//! │  UP:   cans     2 → 8   (ledger: BUNDLE_SPLIT_UP,   before = 2)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sale decrement sees 8 on hand, takes 5, leaves 3.                     │
//! │  Total can-equivalents conserved at every step.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module only *plans*: it inspects resolved lines and decides which
//! conversions are needed, or rejects the sale outright. Executing the plan
//! (locating the store's own stock rows, mutating quantities, writing
//! ledger entries) is I/O and lives in caja-checkout.

use crate::error::{CoreError, CoreResult};
use crate::types::ResolvedSaleLine;

/// One planned bundle → loose conversion.
///
/// Always exactly one bundle down and `units_per_bundle` loose units up:
/// the quantity guard guarantees a single bundle covers any allowed
/// shortfall (requested < units_per_bundle, so the shortfall is at most
/// units_per_bundle - 1 even with zero loose stock).
#[derive(Debug, Clone, PartialEq)]
pub struct BundleConversion {
    /// Catalog id of the parent bundle product to break.
    pub parent_product_id: String,
    /// Catalog id of the loose product to top up. Execution credits the
    /// store's own stock row for it, never a consignment row.
    pub loose_product_id: String,
    /// Loose variant's display name, for error messages and ledger reasons.
    pub loose_product_name: String,
    /// Loose units one bundle yields.
    pub units_per_bundle: i64,
}

/// Plans the conversions a set of resolved sale lines requires.
///
/// ## Rules (in order, per line)
/// 1. Lines whose product is not a loose variant are ignored.
/// 2. Requesting `units_per_bundle` or more of a loose variant fails the
///    whole sale with [`CoreError::ExcessiveBundleQuantity`]. This is a
///    business-rule guard, independent of stock levels.
/// 3. If loose on-hand already covers the request, no conversion.
/// 4. Otherwise one conversion is planned for the line.
///
/// The caller must execute all down-conversions before any up-conversion
/// so the bundle's removal is validated before loose stock is topped up.
pub fn plan_conversions(lines: &[ResolvedSaleLine]) -> CoreResult<Vec<BundleConversion>> {
    let mut conversions = Vec::new();

    for line in lines {
        let (parent_id, units_per_bundle) = match (
            line.product.fraction_of_id.as_ref(),
            line.product.units_per_bundle,
        ) {
            (Some(parent), Some(units)) if units > 0 => (parent, units),
            _ => continue,
        };

        if line.quantity >= units_per_bundle as f64 {
            return Err(CoreError::ExcessiveBundleQuantity {
                product: line.display_name().to_string(),
                requested: line.quantity,
                units_per_bundle,
            });
        }

        if line.stock.quantity < line.quantity {
            conversions.push(BundleConversion {
                parent_product_id: parent_id.clone(),
                loose_product_id: line.product.id.clone(),
                loose_product_name: line.display_name().to_string(),
                units_per_bundle,
            });
        }
    }

    Ok(conversions)
}

// =============================================================================
// Unit Tests
// =============================================================================
