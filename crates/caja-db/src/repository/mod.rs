//! # Repository Implementations
//!
//! Database repositories, one per aggregate.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Repository Layout                                   │
//! │                                                                         │
//! │  sale      → sales, sale_lines, applied_discounts                      │
//! │  stock     → product_stocks joined with catalog_products               │
//! │  movement  → stock_movements (append-only ledger)                      │
//! │  period    → accounting_periods (read-only here)                      │
//! │  discount  → discount_rules (read-only here)                           │
//! │                                                                         │
//! │  Pool-holding methods serve standalone reads. Methods that take        │
//! │  `conn: &mut SqliteConnection` participate in the caller's             │
//! │  transaction; the sale-commit orchestrator threads a single            │
//! │  transaction through every write.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod discount;
pub mod movement;
pub mod period;
pub mod sale;
pub mod stock;
