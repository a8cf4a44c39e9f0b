//! # Validation Module
//!
//! Payload validation for incoming sale requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Wire decoding (apps/api)                                     │
//! │  ├── Required fields collected by name (syncId, createdAt, productos)  │
//! │  └── 400 response naming every missing field                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Non-empty product list                                            │
//! │  ├── Positive quantities                                               │
//! │  └── Non-negative money fields                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE sync_key (idempotency backstop)                            │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::IncomingSale;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an incoming sale payload before any database work.
///
/// ## Rules
/// - `productos` must be non-empty
/// - `syncId` must be non-empty
/// - every line quantity must be positive
/// - cash/transfer portions must be non-negative
///
/// The client-submitted `total` is deliberately *not* range-checked here:
/// the commit path clamps it to non-negative only when it is actually used
/// as the discount-engine fallback.
pub fn validate_sale(sale: &IncomingSale) -> ValidationResult<()> {
    if sale.lines.is_empty() {
        return Err(ValidationError::EmptyProducts);
    }

    if sale.sync_key.trim().is_empty() {
        return Err(ValidationError::MissingFields {
            fields: vec!["syncId".to_string()],
        });
    }

    for line in &sale.lines {
        if line.quantity <= 0.0 || !line.quantity.is_finite() {
            return Err(ValidationError::NonPositiveQuantity {
                product: line
                    .name
                    .clone()
                    .unwrap_or_else(|| line.product_stock_id.clone()),
                quantity: line.quantity,
            });
        }
    }

    if sale.cash_cents < 0 {
        return Err(ValidationError::NegativeAmount {
            field: "totalcash".to_string(),
        });
    }

    if sale.transfer_cents < 0 {
        return Err(ValidationError::NegativeAmount {
            field: "totaltransfer".to_string(),
        });
    }

    Ok(())
}

/// Checks whether a quantity is effectively a whole number.
///
/// Quantities travel as `f64`, so `5.0` is integral while `5.25` is not.
/// A small epsilon absorbs decoding noise (`2.9999999999` from a device
/// that computed `3 * 0.9999...`).
pub fn is_integral_quantity(qty: f64) -> bool {
    (qty - qty.round()).abs() < 1e-9
}

// =============================================================================
// Unit Tests
// =============================================================================
