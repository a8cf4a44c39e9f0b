//! # caja-checkout: Sale Commit Engine
//!
//! Orchestrates the atomic sale commit on top of caja-core rules and
//! caja-db repositories.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  apps/api (HTTP)                                                       │
//! │       │ IncomingSale                                                    │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                caja-checkout (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐  │   │
//! │  │   │  commit  │  │  period  │  │ discount │  │    ledger    │  │   │
//! │  │   │ pipeline │  │ validate │  │   seam   │  │ splits+SALE  │  │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │ caja-core (pure rules)      │ caja-db (one transaction)        │
//! │       ▼                             ▼                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotent**: at most one sale per client sync key, under any
//!   interleaving of retries
//! - **Atomic**: a failed commit leaves no sale row, no lines, no
//!   movements and no stock change
//! - **Auditable**: every stock mutation writes an append-only ledger
//!   entry carrying the pre-movement quantity

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commit;
pub mod discount;
pub mod error;
mod ledger;
pub mod period;

// =============================================================================
// Re-exports
// =============================================================================

pub use commit::{CheckoutEngine, CommitOutcome};
pub use discount::{
    resolve_totals, AppliedRule, DiscountEngine, DiscountError, DiscountInput, DiscountLine,
    DiscountOutcome, TableDiscountEngine,
};
pub use error::{CommitError, CommitResult};
pub use period::validate_period;
