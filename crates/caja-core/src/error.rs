//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Business-rule and precondition failures        │
//! │  └── ValidationError  - Payload validation failures                    │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caja-checkout errors                                                  │
//! │  └── CommitError      - Core + Db, raised by the commit orchestrator   │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - HTTP status + JSON body the client sees        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CommitError → ApiError → client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, quantities, ids)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use chrono::{DateTime, Utc};
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule violations and state-precondition failures.
///
/// Every variant raised inside the sale-commit transaction aborts the whole
/// transaction; the period variants are raised before it opens.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The store has no currently open accounting period.
    ///
    /// ## When This Occurs
    /// - All periods for the store are closed
    /// - The store was never opened
    #[error("Store {store_id} has no open accounting period")]
    NoOpenPeriod { store_id: String },

    /// The period the client targeted does not exist at all.
    #[error("Accounting period not found: {period_id}")]
    PeriodNotFound { period_id: String },

    /// The client targeted a period that exists but is not the open one.
    ///
    /// ## Client Recovery
    /// The open period's id and start time ride along so an offline device
    /// can resynchronize and resubmit against the right period.
    #[error("Period {requested} is closed; open period is {open_period_id}")]
    PeriodClosed {
        requested: String,
        open_period_id: String,
        open_since: DateTime<Utc>,
    },

    /// One or more requested product-stock ids did not resolve.
    ///
    /// Items carry the client-supplied display name when one was sent,
    /// otherwise the raw id.
    #[error("Products not found: {}", items.join(", "))]
    ProductsNotFound { items: Vec<String> },

    /// A non-integer quantity was requested for a product that does not
    /// allow decimal quantities.
    #[error("Product {product} does not allow decimal quantities (requested {quantity})")]
    DecimalNotAllowed { product: String, quantity: f64 },

    /// A loose-variant line requested a full bundle's worth or more.
    ///
    /// This is a business-rule guard, not a stock check: selling
    /// `units_per_bundle` or more of the loose variant in one sale is
    /// rejected outright regardless of on-hand stock.
    #[error(
        "Cannot sell {requested} of {product}: equals or exceeds the bundle size of {units_per_bundle}"
    )]
    ExcessiveBundleQuantity {
        product: String,
        requested: f64,
        units_per_bundle: i64,
    },

    /// Desegregation needed a parent bundle but the store's own stock row
    /// for the parent had less than one unit.
    #[error("No bundle stock left to break into loose units of {product}")]
    InsufficientBundleStock { product: String },

    /// The requested quantity exceeds on-hand stock after conversions.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: f64,
        requested: f64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Payload validation errors.
///
/// These occur before any database work and are always recoverable by the
/// client resubmitting a corrected payload.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more required fields are missing from the payload.
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// The product list is empty.
    #[error("productos must be a non-empty list")]
    EmptyProducts,

    /// A line quantity is zero or negative.
    #[error("Quantity for {product} must be positive (got {quantity})")]
    NonPositiveQuantity { product: String, quantity: f64 },

    /// A monetary field that must be non-negative was negative.
    #[error("{field} must not be negative")]
    NegativeAmount { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Cola 330ml".to_string(),
            available: 3.0,
            requested: 5.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Cola 330ml: available 3, requested 5"
        );
    }

    #[test]
    fn test_products_not_found_joins_items() {
        let err = CoreError::ProductsNotFound {
            items: vec!["Cola".to_string(), "ps-9".to_string()],
        };
        assert_eq!(err.to_string(), "Products not found: Cola, ps-9");
    }

    #[test]
    fn test_missing_fields_names_every_field() {
        let err = ValidationError::MissingFields {
            fields: vec!["syncId".to_string(), "createdAt".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required fields: syncId, createdAt");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::EmptyProducts;
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
