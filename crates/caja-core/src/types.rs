//! # Domain Types
//!
//! Core domain types used throughout Caja.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ProductStock   │   │      Sale       │   │  StockMovement  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  quantity       │   │  sync_key (UQ)  │   │  kind           │       │
//! │  │  price_cents    │   │  total_cents    │   │  qty_before     │       │
//! │  │  supplier_id?   │   │  period_id      │   │  sale_id?       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CatalogProduct  │   │ AccountingPeriod│   │  MovementKind   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  allows_decimal │   │  opened_at      │   │  Sale           │       │
//! │  │  fraction_of_id │   │  closed_at?     │   │  BundleSplitDown│       │
//! │  │  units/bundle   │   │  (NULL = open)  │   │  BundleSplitUp  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has an `id` (UUID v4, immutable, used for database relations).
//! The Sale additionally carries `sync_key`, the client-generated idempotency
//! key that makes at-least-once delivery safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Movement Kind
// =============================================================================

/// The kind of a stock movement ledger entry.
///
/// ## Why a Closed Enum?
/// The movement log is the audit trail downstream reporting reconstructs
/// stock history from. A free-form tag would let a typo silently split the
/// ledger; a closed enum forces every writer to be exhaustively handled.
///
/// `Restock` and `Adjustment` are written by the purchasing and stocktake
/// subsystems, not by the sale-commit path, but they share this ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Stock left the store because a sale line consumed it.
    Sale,
    /// One bundle product was removed to be broken into loose units.
    BundleSplitDown,
    /// Loose units were added from a broken bundle.
    BundleSplitUp,
    /// Stock arrived from a supplier (purchasing subsystem).
    Restock,
    /// Manual correction from a stocktake (inventory subsystem).
    Adjustment,
}

// =============================================================================
// Catalog Product
// =============================================================================

/// A catalog-level product definition, shared by every store.
///
/// The fraction metadata is what drives desegregation: a product with
/// `fraction_of_id = Some(parent)` is the loose variant of `parent` (e.g.
/// a single can inside a six-pack), and `units_per_bundle` says how many
/// loose units one parent bundle yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogProduct {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to the operator and in error messages.
    pub name: String,

    /// Whether non-integer quantities may be sold (e.g. produce by weight).
    pub allows_decimal: bool,

    /// Parent bundle product, when this is a loose variant.
    pub fraction_of_id: Option<String>,

    /// How many loose units one parent bundle decomposes into.
    /// Only meaningful when `fraction_of_id` is set.
    pub units_per_bundle: Option<i64>,
}

impl CatalogProduct {
    /// Whether this product is the loose variant of a bundle.
    pub fn is_fraction(&self) -> bool {
        self.fraction_of_id.is_some() && self.units_per_bundle.is_some()
    }
}

// =============================================================================
// Product Stock
// =============================================================================

/// Per-store stock row for a catalog product.
///
/// A store can hold several rows for the same product: its own stock
/// (`supplier_id = None`) and consignment stock per supplier. Quantity is
/// mutated only through atomic increment/decrement inside the sale-commit
/// transaction, always read-validated first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductStock {
    pub id: String,
    pub store_id: String,
    pub product_id: String,
    /// Current on-hand quantity. REAL in SQLite; fractional only for
    /// products that allow decimal quantities.
    pub quantity: f64,
    /// Unit cost in cents at this store.
    pub unit_cost_cents: i64,
    /// Unit sale price in cents at this store.
    pub unit_price_cents: i64,
    /// Owning supplier for consignment stock; None for store-owned stock.
    pub supplier_id: Option<String>,
}

impl ProductStock {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Created exactly once by the sale-commit orchestrator and never mutated
/// afterwards within this core. `sync_key` is the client-generated
/// idempotency key: at most one Sale exists per key, enforced both by the
/// pre-transaction lookup and by a UNIQUE constraint at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub store_id: String,
    /// Operator (user) who made the sale on the device.
    pub user_id: String,
    /// Accounting period the sale was committed into.
    pub period_id: String,
    /// Server-resolved total in cents (see discount adapter rules).
    pub total_cents: i64,
    /// Portion paid in cash, in cents.
    pub cash_cents: i64,
    /// Portion paid by transfer, in cents.
    pub transfer_cents: i64,
    /// Total discount applied, in cents. Zero when the engine did not run.
    pub discount_total_cents: i64,
    /// Client-generated idempotency key (unique).
    pub sync_key: String,
    /// Creation timestamp as reported by the (possibly offline) device.
    pub client_created_at: DateTime<Utc>,
    /// Whether the device reported being offline when the sale was made.
    pub was_offline: bool,
    /// How many delivery attempts the device reported for this payload.
    pub sync_attempts: i64,
    /// Destination account for the transfer portion, when any.
    pub transfer_destination_id: Option<String>,
    /// When the server committed the sale.
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the persisted total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A sale together with its line items, as returned to clients.
///
/// This is the `venta` payload of the commit and duplicate responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithLines {
    #[serde(flatten)]
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Sale Line
// =============================================================================

/// One product quantity within a Sale.
///
/// Cost and price are frozen from the authoritative stock row at commit
/// time (snapshot pattern); the client-supplied price never lands here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    /// The store's stock row this line consumed from.
    pub product_stock_id: String,
    /// Quantity sold; fractional only when the product allows decimals.
    pub quantity: f64,
    /// Unit cost in cents at time of sale (frozen).
    pub unit_cost_cents: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
}

// =============================================================================
// Applied Discount
// =============================================================================

/// Record of one discount rule's effect on a Sale.
///
/// Zero-to-many per sale; written only when the discount engine reported a
/// non-zero total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AppliedDiscount {
    pub id: String,
    pub sale_id: String,
    /// The discount rule that fired.
    pub rule_id: String,
    /// Amount deducted from the sale, in cents.
    pub amount_cents: i64,
    /// Optional JSON description of the affected line items.
    pub detail: Option<String>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Append-only stock ledger entry.
///
/// One row per inventory-affecting step, carrying the pre-movement quantity
/// snapshot. Never updated or deleted; external reporting reconstructs full
/// stock history from this ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub kind: MovementKind,
    /// Magnitude of the movement (always positive; `kind` carries direction).
    pub quantity: f64,
    pub product_stock_id: String,
    pub store_id: String,
    /// Operator responsible for the movement.
    pub user_id: String,
    /// On-hand quantity immediately before this movement was applied.
    pub quantity_before: f64,
    /// The sale that caused this movement, when any.
    pub sale_id: Option<String>,
    /// Free-text reason for the audit trail.
    pub reason: Option<String>,
    /// Supplier reference for consignment stock, so settlement reporting
    /// can separate consigned sales from owned sales.
    pub supplier_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Accounting Period
// =============================================================================

/// A store-scoped open/closed accounting window.
///
/// At most one row per store has `closed_at = None` at any time. The
/// sale-commit core only reads that invariant; the period open/close
/// subsystem enforces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AccountingPeriod {
    pub id: String,
    pub store_id: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl AccountingPeriod {
    /// Whether the period is still open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

// =============================================================================
// Incoming Payload Types
// =============================================================================

/// One line of an incoming sale payload, exactly as the client sent it.
///
/// Client-supplied `name` and `unit_price_cents` are advisory: the name is
/// only used to produce readable not-found errors, and the price only feeds
/// the discount calculation. Persisted cost/price always come from the
/// authoritative stock row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingSaleLine {
    pub product_stock_id: String,
    pub quantity: f64,
    pub name: Option<String>,
    pub unit_price_cents: Option<i64>,
}

/// An incoming sale payload after wire-level decoding, before resolution
/// against the authoritative stock rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingSale {
    pub lines: Vec<IncomingSaleLine>,
    /// Client-computed total; used only as a fallback when the discount
    /// engine could not run, clamped to non-negative.
    pub total_cents: i64,
    pub cash_cents: i64,
    pub transfer_cents: i64,
    pub transfer_destination_id: Option<String>,
    /// Client-generated idempotency key.
    pub sync_key: String,
    /// Creation timestamp reported by the device.
    pub client_created_at: DateTime<Utc>,
    pub was_offline: bool,
    pub sync_attempts: i64,
    pub discount_codes: Vec<String>,
}

/// A sale line merged with its authoritative stock row and catalog product.
///
/// This is the shape the validation, fractional-planning and ledger steps
/// operate on; nothing past resolution ever touches the raw client fields
/// again.
#[derive(Debug, Clone)]
pub struct ResolvedSaleLine {
    /// The store's stock row being sold from.
    pub stock: ProductStock,
    /// The catalog product behind the stock row (fraction metadata lives here).
    pub product: CatalogProduct,
    /// Requested quantity.
    pub quantity: f64,
    /// Client-supplied unit price, kept only as discount-calculation input.
    pub requested_unit_price_cents: Option<i64>,
}

impl ResolvedSaleLine {
    /// Unit price to feed into the discount engine: the client-supplied
    /// price when present (the device may have applied a manual override),
    /// otherwise the authoritative row price.
    pub fn pricing_unit_price(&self) -> Money {
        Money::from_cents(
            self.requested_unit_price_cents
                .unwrap_or(self.stock.unit_price_cents),
        )
    }

    /// Display name for error messages.
    pub fn display_name(&self) -> &str {
        &self.product.name
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(price: i64) -> ProductStock {
        ProductStock {
            id: "ps-1".to_string(),
            store_id: "store-1".to_string(),
            product_id: "prod-1".to_string(),
            quantity: 10.0,
            unit_cost_cents: 100,
            unit_price_cents: price,
            supplier_id: None,
        }
    }

    fn product() -> CatalogProduct {
        CatalogProduct {
            id: "prod-1".to_string(),
            name: "Cola 330ml".to_string(),
            allows_decimal: false,
            fraction_of_id: None,
            units_per_bundle: None,
        }
    }

    #[test]
    fn test_pricing_price_prefers_client_value() {
        let line = ResolvedSaleLine {
            stock: stock(250),
            product: product(),
            quantity: 2.0,
            requested_unit_price_cents: Some(199),
        };
        assert_eq!(line.pricing_unit_price().cents(), 199);
    }

    #[test]
    fn test_pricing_price_falls_back_to_row() {
        let line = ResolvedSaleLine {
            stock: stock(250),
            product: product(),
            quantity: 2.0,
            requested_unit_price_cents: None,
        };
        assert_eq!(line.pricing_unit_price().cents(), 250);
    }

    #[test]
    fn test_is_fraction_requires_both_fields() {
        let mut p = product();
        assert!(!p.is_fraction());
        p.fraction_of_id = Some("bundle-1".to_string());
        assert!(!p.is_fraction());
        p.units_per_bundle = Some(6);
        assert!(p.is_fraction());
    }

    #[test]
    fn test_period_is_open() {
        let mut period = AccountingPeriod {
            id: "p1".to_string(),
            store_id: "s1".to_string(),
            opened_at: Utc::now(),
            closed_at: None,
        };
        assert!(period.is_open());
        period.closed_at = Some(Utc::now());
        assert!(!period.is_open());
    }

    #[test]
    fn test_movement_kind_serializes_to_ledger_tags() {
        assert_eq!(
            serde_json::to_string(&MovementKind::BundleSplitDown).unwrap(),
            "\"BUNDLE_SPLIT_DOWN\""
        );
        assert_eq!(serde_json::to_string(&MovementKind::Sale).unwrap(), "\"SALE\"");
    }
}
