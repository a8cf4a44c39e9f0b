//! # Commit Error Types
//!
//! Error type for the sale commit path.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError (business rule) ──┐                                         │
//! │                              ├──► CommitError ──► ApiError (apps/api)  │
//! │  DbError (infrastructure) ───┘                                         │
//! │                                                                         │
//! │  DiscountError never reaches here: discount failures are swallowed     │
//! │  by the orchestrator and logged, the sale proceeds undiscounted.       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use caja_core::CoreError;
use caja_db::DbError;

/// Errors from the sale commit orchestrator.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A business rule rejected the sale.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database layer failed.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for commit operations.
pub type CommitResult<T> = Result<T, CommitError>;
