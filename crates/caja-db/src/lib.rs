//! # caja-db: Database Layer for Caja
//!
//! This crate provides database access for the Caja service.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Caja Data Flow                                  │
//! │                                                                         │
//! │  HTTP handler / commit orchestrator (caja-checkout)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      caja-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (sale.rs,    │    │  (embedded)  │  │   │
//! │  │   │               │    │   stock.rs,   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│   movement,   │    │ 001_init.sql │  │   │
//! │  │   │ begin() → tx  │    │   period,     │    │ ...          │  │   │
//! │  │   │               │    │   discount)   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (sale, stock, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/caja.db")).await?;
//!
//! // Standalone reads go through the pool
//! let existing = db.sales().find_by_sync_key("device-42-0001").await?;
//!
//! // Commit writes share one transaction
//! let mut tx = db.begin().await?;
//! db.sales().insert(&mut tx, &sale).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::discount::{DiscountRule, DiscountRuleRepository};
pub use repository::movement::MovementRepository;
pub use repository::period::PeriodRepository;
pub use repository::sale::{
    ExpandedAppliedDiscount, ExpandedSale, ExpandedSaleLine, SaleRepository,
};
pub use repository::stock::StockRepository;
