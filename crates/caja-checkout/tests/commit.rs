//! Integration tests for the sale commit pipeline.
//!
//! Every test runs against an isolated in-memory SQLite database with the
//! real migrations applied, driving the engine exactly like the HTTP layer
//! does.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;

use caja_checkout::{
    CheckoutEngine, CommitError, DiscountEngine, DiscountError, DiscountInput, DiscountOutcome,
    TableDiscountEngine,
};
use caja_core::{CoreError, IncomingSale, IncomingSaleLine, MovementKind, ValidationError};
use caja_db::{Database, DbConfig};

// =============================================================================
// Fixtures
// =============================================================================

const STORE: &str = "store-1";
const OPERATOR: &str = "user-1";
const PERIOD: &str = "period-open";

async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

fn engine(db: &Database) -> CheckoutEngine {
    CheckoutEngine::new(db.clone(), Arc::new(TableDiscountEngine::new(db)))
}

async fn seed_base(db: &Database) {
    sqlx::query("INSERT INTO stores (id, name, created_at) VALUES (?1, 'Main Store', ?2)")
        .bind(STORE)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

    sqlx::query("INSERT INTO users (id, name) VALUES (?1, 'Ana')")
        .bind(OPERATOR)
        .execute(db.pool())
        .await
        .unwrap();

    sqlx::query("INSERT INTO accounting_periods (id, store_id, opened_at) VALUES (?1, ?2, ?3)")
        .bind(PERIOD)
        .bind(STORE)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
}

async fn seed_product(
    db: &Database,
    id: &str,
    name: &str,
    allows_decimal: bool,
    fraction_of: Option<&str>,
    units_per_bundle: Option<i64>,
) {
    sqlx::query(
        r#"
        INSERT INTO catalog_products (id, name, allows_decimal, fraction_of_id, units_per_bundle)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(allows_decimal)
    .bind(fraction_of)
    .bind(units_per_bundle)
    .execute(db.pool())
    .await
    .unwrap();
}

async fn seed_stock(
    db: &Database,
    id: &str,
    product_id: &str,
    quantity: f64,
    cost: i64,
    price: i64,
    supplier_id: Option<&str>,
) {
    sqlx::query(
        r#"
        INSERT INTO product_stocks
            (id, store_id, product_id, quantity, unit_cost_cents, unit_price_cents, supplier_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(id)
    .bind(STORE)
    .bind(product_id)
    .bind(quantity)
    .bind(cost)
    .bind(price)
    .bind(supplier_id)
    .execute(db.pool())
    .await
    .unwrap();
}

async fn seed_rule(
    db: &Database,
    id: &str,
    name: &str,
    code: Option<&str>,
    percent_bps: i64,
    min_subtotal_cents: i64,
) {
    sqlx::query(
        r#"
        INSERT INTO discount_rules (id, store_id, name, code, percent_bps, min_subtotal_cents, is_active)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
        "#,
    )
    .bind(id)
    .bind(STORE)
    .bind(name)
    .bind(code)
    .bind(percent_bps)
    .bind(min_subtotal_cents)
    .execute(db.pool())
    .await
    .unwrap();
}

fn line(stock_id: &str, quantity: f64, name: &str) -> IncomingSaleLine {
    IncomingSaleLine {
        product_stock_id: stock_id.to_string(),
        quantity,
        name: Some(name.to_string()),
        unit_price_cents: None,
    }
}

fn payload(sync_key: &str, lines: Vec<IncomingSaleLine>, total: i64) -> IncomingSale {
    IncomingSale {
        lines,
        total_cents: total,
        cash_cents: total.max(0),
        transfer_cents: 0,
        transfer_destination_id: None,
        sync_key: sync_key.to_string(),
        client_created_at: Utc::now(),
        was_offline: false,
        sync_attempts: 0,
        discount_codes: vec![],
    }
}

async fn stock_quantity(db: &Database, stock_id: &str) -> f64 {
    db.stock()
        .get_by_id(stock_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

async fn sale_count(db: &Database) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(db.pool())
        .await
        .unwrap()
}

async fn movement_count(db: &Database) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
        .fetch_one(db.pool())
        .await
        .unwrap()
}

/// Standard two-product shop: Cola (price 250) and Bread (price 100).
async fn seed_simple_shop(db: &Database) {
    seed_base(db).await;
    seed_product(db, "p-cola", "Cola 330ml", false, None, None).await;
    seed_product(db, "p-bread", "Bread", false, None, None).await;
    seed_stock(db, "ps-cola", "p-cola", 10.0, 120, 250, None).await;
    seed_stock(db, "ps-bread", "p-bread", 10.0, 60, 100, None).await;
}

/// Bundle shop: six-pack bundles (3 on hand) and loose cans (2 on hand).
async fn seed_bundle_shop(db: &Database) {
    seed_base(db).await;
    seed_product(db, "p-sixpack", "Six-Pack", false, None, None).await;
    seed_product(db, "p-can", "Single Can", false, Some("p-sixpack"), Some(6)).await;
    seed_stock(db, "ps-sixpack", "p-sixpack", 3.0, 300, 550, None).await;
    seed_stock(db, "ps-can", "p-can", 2.0, 50, 100, None).await;
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_commit_persists_sale_lines_and_movements() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let p = payload(
        "sync-1",
        vec![line("ps-cola", 2.0, "Cola 330ml"), line("ps-bread", 1.0, "Bread")],
        600,
    );
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    assert!(!outcome.duplicate);
    let sale = &outcome.sale.sale;
    assert_eq!(sale.store_id, STORE);
    assert_eq!(sale.period_id, PERIOD);
    assert_eq!(sale.sync_key, "sync-1");
    // No rules configured: the engine ran and resolved total = subtotal.
    assert_eq!(sale.total_cents, 600);
    assert_eq!(sale.discount_total_cents, 0);

    assert_eq!(outcome.sale.lines.len(), 2);
    let cola_line = outcome
        .sale
        .lines
        .iter()
        .find(|l| l.product_stock_id == "ps-cola")
        .unwrap();
    assert_eq!(cola_line.quantity, 2.0);
    assert_eq!(cola_line.unit_price_cents, 250);
    assert_eq!(cola_line.unit_cost_cents, 120);

    assert_eq!(stock_quantity(&db, "ps-cola").await, 8.0);
    assert_eq!(stock_quantity(&db, "ps-bread").await, 9.0);

    let movements = db.movements().list_for_sale(&sale.id).await.unwrap();
    assert_eq!(movements.len(), 2);
    for m in &movements {
        assert_eq!(m.kind, MovementKind::Sale);
        assert_eq!(m.user_id, OPERATOR);
        assert_eq!(m.quantity_before, 10.0);
    }
}

#[tokio::test]
async fn test_client_price_feeds_total_but_not_lines() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let mut p = payload("sync-override", vec![line("ps-cola", 2.0, "Cola 330ml")], 400);
    // Manual till override: 200 instead of the row's 250.
    p.lines[0].unit_price_cents = Some(200);

    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    // The override priced the sale...
    assert_eq!(outcome.sale.sale.total_cents, 400);
    // ...but the persisted line keeps the authoritative snapshot.
    assert_eq!(outcome.sale.lines[0].unit_price_cents, 250);
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn test_duplicate_sync_key_replays_same_sale() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let p = payload("sync-dup", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);

    let first = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    let second = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.sale.sale.id, second.sale.sale.id);
    assert_eq!(first.sale.sale.total_cents, second.sale.sale.total_cents);
    assert_eq!(second.sale.lines.len(), 1);

    // Committed once: stock moved once, one sale row, one movement.
    assert_eq!(stock_quantity(&db, "ps-cola").await, 8.0);
    assert_eq!(sale_count(&db).await, 1);
    assert_eq!(movement_count(&db).await, 1);
}

#[tokio::test]
async fn test_duplicate_with_different_body_still_replays_original() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let p1 = payload("sync-same", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    let first = engine.commit_sale(STORE, PERIOD, OPERATOR, &p1).await.unwrap();

    // Retry arrives mangled: different products, different total. The key
    // wins; the stored sale is what comes back.
    let p2 = payload("sync-same", vec![line("ps-bread", 5.0, "Bread")], 999);
    let second = engine.commit_sale(STORE, PERIOD, OPERATOR, &p2).await.unwrap();

    assert!(second.duplicate);
    assert_eq!(second.sale.sale.id, first.sale.sale.id);
    assert_eq!(second.sale.sale.total_cents, first.sale.sale.total_cents);
    assert_eq!(stock_quantity(&db, "ps-bread").await, 10.0);
}

/// Discount engine that commits a rival sale with the same sync key while
/// the caller's commit is in flight, reproducing a second device retry
/// landing between the duplicate pre-check and the sale insert.
struct RivalSaleEngine {
    db: Database,
    sync_key: String,
}

#[async_trait]
impl DiscountEngine for RivalSaleEngine {
    async fn compute(
        &self,
        conn: &mut SqliteConnection,
        input: &DiscountInput,
    ) -> Result<DiscountOutcome, DiscountError> {
        // Park this request's read transaction so the rival can commit on
        // another connection, then reopen it; the insert that follows runs
        // against a database that already holds the rival's sale row.
        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(|e| DiscountError::Internal(e.to_string()))?;

        let rival = CheckoutEngine::new(
            self.db.clone(),
            Arc::new(TableDiscountEngine::new(&self.db)),
        );
        let p = payload(&self.sync_key, vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
        rival
            .commit_sale(STORE, PERIOD, OPERATOR, &p)
            .await
            .map_err(|e| DiscountError::Internal(e.to_string()))?;

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| DiscountError::Internal(e.to_string()))?;

        Ok(DiscountOutcome::unchanged(input.subtotal_cents))
    }
}

#[tokio::test]
async fn test_sync_key_race_on_insert_replays_winner() {
    // File-backed database: the rival needs a second connection, which the
    // single-connection in-memory config cannot provide.
    let path = std::env::temp_dir().join(format!("caja-race-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    seed_simple_shop(&db).await;

    let engine = CheckoutEngine::new(
        db.clone(),
        Arc::new(RivalSaleEngine {
            db: db.clone(),
            sync_key: "sync-race".to_string(),
        }),
    );

    let p = payload("sync-race", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    // The rival won the race; its sale comes back as a duplicate replay.
    assert!(outcome.duplicate);
    let winner = db
        .sales()
        .find_by_sync_key("sync-race")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.sale.sale.id, winner.sale.id);
    assert_eq!(outcome.sale.lines.len(), 1);

    // Exactly one commit touched the store.
    assert_eq!(sale_count(&db).await, 1);
    assert_eq!(stock_quantity(&db, "ps-cola").await, 8.0);
    assert_eq!(movement_count(&db).await, 1);

    db.close().await;
}

// =============================================================================
// Period Validation
// =============================================================================

#[tokio::test]
async fn test_no_open_period_rejected() {
    let db = setup().await;
    seed_base(&db).await;
    sqlx::query("UPDATE accounting_periods SET closed_at = ?1")
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
    seed_product(&db, "p-cola", "Cola 330ml", false, None, None).await;
    seed_stock(&db, "ps-cola", "p-cola", 10.0, 120, 250, None).await;
    let engine = engine(&db);

    let p = payload("sync-np", vec![line("ps-cola", 1.0, "Cola 330ml")], 250);
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();

    assert!(matches!(
        err,
        CommitError::Core(CoreError::NoOpenPeriod { .. })
    ));
}

#[tokio::test]
async fn test_closed_period_reports_open_one() {
    let db = setup().await;
    seed_simple_shop(&db).await;

    // A second, closed period the offline device still targets.
    sqlx::query(
        "INSERT INTO accounting_periods (id, store_id, opened_at, closed_at) VALUES ('period-old', ?1, ?2, ?3)",
    )
    .bind(STORE)
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .unwrap();

    let engine = engine(&db);
    let p = payload("sync-cp", vec![line("ps-cola", 1.0, "Cola 330ml")], 250);
    let err = engine
        .commit_sale(STORE, "period-old", OPERATOR, &p)
        .await
        .unwrap_err();

    match err {
        CommitError::Core(CoreError::PeriodClosed {
            requested,
            open_period_id,
            ..
        }) => {
            assert_eq!(requested, "period-old");
            assert_eq!(open_period_id, PERIOD);
        }
        other => panic!("expected PeriodClosed, got {other:?}"),
    }
    assert_eq!(sale_count(&db).await, 0);
}

#[tokio::test]
async fn test_unknown_period_rejected() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let p = payload("sync-up", vec![line("ps-cola", 1.0, "Cola 330ml")], 250);
    let err = engine
        .commit_sale(STORE, "period-nope", OPERATOR, &p)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CommitError::Core(CoreError::PeriodNotFound { .. })
    ));
}

// =============================================================================
// Payload and Resolution Errors
// =============================================================================

#[tokio::test]
async fn test_empty_product_list_rejected() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let p = payload("sync-empty", vec![], 0);
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();

    assert!(matches!(
        err,
        CommitError::Core(CoreError::Validation(ValidationError::EmptyProducts))
    ));
}

#[tokio::test]
async fn test_unknown_products_reported_by_client_name() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    let mut unnamed = line("ps-ghost-2", 1.0, "");
    unnamed.name = None;
    let p = payload(
        "sync-ghost",
        vec![
            line("ps-cola", 1.0, "Cola 330ml"),
            line("ps-ghost-1", 1.0, "Fanta 500ml"),
            unnamed,
        ],
        450,
    );
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();

    match err {
        CommitError::Core(CoreError::ProductsNotFound { items }) => {
            // Client name when present, stock id otherwise.
            assert_eq!(items, vec!["Fanta 500ml".to_string(), "ps-ghost-2".to_string()]);
        }
        other => panic!("expected ProductsNotFound, got {other:?}"),
    }
    assert_eq!(stock_quantity(&db, "ps-cola").await, 10.0);
}

#[tokio::test]
async fn test_decimal_quantity_needs_decimal_product() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    seed_product(&db, "p-cheese", "Cheese (kg)", true, None, None).await;
    seed_stock(&db, "ps-cheese", "p-cheese", 5.0, 700, 1200, None).await;
    let engine = engine(&db);

    let p = payload("sync-dec1", vec![line("ps-cola", 1.5, "Cola 330ml")], 375);
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();
    assert!(matches!(
        err,
        CommitError::Core(CoreError::DecimalNotAllowed { .. })
    ));

    let p = payload("sync-dec2", vec![line("ps-cheese", 1.5, "Cheese (kg)")], 1800);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    assert_eq!(outcome.sale.lines[0].quantity, 1.5);
    assert_eq!(stock_quantity(&db, "ps-cheese").await, 3.5);
}

// =============================================================================
// Bundle Desegregation
// =============================================================================

#[tokio::test]
async fn test_bundle_split_covers_loose_shortfall() {
    let db = setup().await;
    seed_bundle_shop(&db).await;
    let engine = engine(&db);

    // 5 cans wanted, 2 loose on hand, six-packs: 3.
    let p = payload("sync-split", vec![line("ps-can", 5.0, "Single Can")], 500);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    assert_eq!(stock_quantity(&db, "ps-sixpack").await, 2.0);
    assert_eq!(stock_quantity(&db, "ps-can").await, 3.0);

    let movements = db
        .movements()
        .list_for_sale(&outcome.sale.sale.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);

    assert_eq!(movements[0].kind, MovementKind::BundleSplitDown);
    assert_eq!(movements[0].product_stock_id, "ps-sixpack");
    assert_eq!(movements[0].quantity, 1.0);
    assert_eq!(movements[0].quantity_before, 3.0);

    assert_eq!(movements[1].kind, MovementKind::BundleSplitUp);
    assert_eq!(movements[1].product_stock_id, "ps-can");
    assert_eq!(movements[1].quantity, 6.0);
    assert_eq!(movements[1].quantity_before, 2.0);

    assert_eq!(movements[2].kind, MovementKind::Sale);
    assert_eq!(movements[2].product_stock_id, "ps-can");
    assert_eq!(movements[2].quantity, 5.0);
    assert_eq!(movements[2].quantity_before, 8.0);
}

#[tokio::test]
async fn test_full_bundle_quantity_rejected_even_with_stock() {
    let db = setup().await;
    seed_bundle_shop(&db).await;
    // Plenty of loose cans; the guard is a business rule, not a stock rule.
    sqlx::query("UPDATE product_stocks SET quantity = 100 WHERE id = 'ps-can'")
        .execute(db.pool())
        .await
        .unwrap();
    let engine = engine(&db);

    let p = payload("sync-six", vec![line("ps-can", 6.0, "Single Can")], 600);
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();

    assert!(matches!(
        err,
        CommitError::Core(CoreError::ExcessiveBundleQuantity {
            units_per_bundle: 6,
            ..
        })
    ));
    assert_eq!(stock_quantity(&db, "ps-can").await, 100.0);
    assert_eq!(sale_count(&db).await, 0);
}

#[tokio::test]
async fn test_no_bundles_to_break_rolls_back() {
    let db = setup().await;
    seed_bundle_shop(&db).await;
    sqlx::query("UPDATE product_stocks SET quantity = 0 WHERE id = 'ps-sixpack'")
        .execute(db.pool())
        .await
        .unwrap();
    let engine = engine(&db);

    let p = payload("sync-nobundle", vec![line("ps-can", 5.0, "Single Can")], 500);
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();

    assert!(matches!(
        err,
        CommitError::Core(CoreError::InsufficientBundleStock { .. })
    ));
    assert_eq!(stock_quantity(&db, "ps-can").await, 2.0);
    assert_eq!(sale_count(&db).await, 0);
    assert_eq!(movement_count(&db).await, 0);
}

#[tokio::test]
async fn test_bundle_split_credits_only_the_store_own_row() {
    let db = setup().await;
    seed_base(&db).await;
    sqlx::query("INSERT INTO suppliers (id, name) VALUES ('sup-1', 'Acme Distribution')")
        .execute(db.pool())
        .await
        .unwrap();
    seed_product(&db, "p-sixpack", "Six-Pack", false, None, None).await;
    seed_product(&db, "p-can", "Single Can", false, Some("p-sixpack"), Some(6)).await;
    seed_stock(&db, "ps-sixpack", "p-sixpack", 3.0, 300, 550, None).await;
    seed_stock(&db, "ps-can-own", "p-can", 0.0, 50, 100, None).await;
    seed_stock(&db, "ps-can-consign", "p-can", 2.0, 50, 100, Some("sup-1")).await;
    let engine = engine(&db);

    // A shortfall on the consignment row: the split tops up the store's
    // own row, never the supplier's, so the consignment decrement still
    // falls short and the whole sale rolls back.
    let p = payload(
        "sync-consign-short",
        vec![line("ps-can-consign", 5.0, "Single Can")],
        500,
    );
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();
    assert!(matches!(
        err,
        CommitError::Core(CoreError::InsufficientStock { .. })
    ));
    assert_eq!(stock_quantity(&db, "ps-sixpack").await, 3.0);
    assert_eq!(stock_quantity(&db, "ps-can-own").await, 0.0);
    assert_eq!(stock_quantity(&db, "ps-can-consign").await, 2.0);
    assert_eq!(movement_count(&db).await, 0);

    // The same shortfall on the store's own row splits normally; the
    // consignment row stays untouched.
    let p = payload(
        "sync-own-short",
        vec![line("ps-can-own", 5.0, "Single Can")],
        500,
    );
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    assert_eq!(stock_quantity(&db, "ps-sixpack").await, 2.0);
    assert_eq!(stock_quantity(&db, "ps-can-own").await, 1.0);
    assert_eq!(stock_quantity(&db, "ps-can-consign").await, 2.0);

    let movements = db
        .movements()
        .list_for_sale(&outcome.sale.sale.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);
    assert_eq!(movements[1].kind, MovementKind::BundleSplitUp);
    assert_eq!(movements[1].product_stock_id, "ps-can-own");
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn test_oversell_rolls_back_earlier_lines() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = engine(&db);

    // First line is fine, second oversells. Nothing may survive.
    let p = payload(
        "sync-rollback",
        vec![
            line("ps-cola", 2.0, "Cola 330ml"),
            line("ps-bread", 99.0, "Bread"),
        ],
        10400,
    );
    let err = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap_err();

    match err {
        CommitError::Core(CoreError::InsufficientStock {
            product,
            available,
            requested,
        }) => {
            assert_eq!(product, "Bread");
            assert_eq!(available, 10.0);
            assert_eq!(requested, 99.0);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(stock_quantity(&db, "ps-cola").await, 10.0);
    assert_eq!(stock_quantity(&db, "ps-bread").await, 10.0);
    assert_eq!(sale_count(&db).await, 0);
    assert_eq!(movement_count(&db).await, 0);

    // And the failed sync key is NOT burned: a corrected retry commits.
    let p = payload("sync-rollback", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    assert!(!outcome.duplicate);
}

// =============================================================================
// Discounts
// =============================================================================

#[tokio::test]
async fn test_automatic_rule_discounts_sale() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    // 10% off everything, no code, no minimum.
    seed_rule(&db, "rule-10", "Ten Percent", None, 1000, 0).await;
    let engine = engine(&db);

    // Client claims 600; the engine's verdict overrides it.
    let p = payload("sync-disc", vec![line("ps-cola", 2.0, "Cola 330ml")], 600);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    let sale = &outcome.sale.sale;
    // Subtotal 500, 10% = 50 off.
    assert_eq!(sale.discount_total_cents, 50);
    assert_eq!(sale.total_cents, 450);

    let applied: Vec<(String, i64)> = sqlx::query_as(
        "SELECT rule_id, amount_cents FROM applied_discounts WHERE sale_id = ?1",
    )
    .bind(&sale.id)
    .fetch_all(db.pool())
    .await
    .unwrap();
    assert_eq!(applied, vec![("rule-10".to_string(), 50)]);
}

#[tokio::test]
async fn test_code_rule_fires_only_with_code() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    seed_rule(&db, "rule-promo", "Promo", Some("SAVE20"), 2000, 0).await;
    let engine = engine(&db);

    let p = payload("sync-nocode", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    assert_eq!(outcome.sale.sale.discount_total_cents, 0);
    assert_eq!(outcome.sale.sale.total_cents, 500);

    let mut p = payload("sync-code", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    p.discount_codes = vec!["save20".to_string()]; // case-insensitive
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    assert_eq!(outcome.sale.sale.discount_total_cents, 100);
    assert_eq!(outcome.sale.sale.total_cents, 400);
}

#[tokio::test]
async fn test_minimum_subtotal_gates_rule() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    seed_rule(&db, "rule-big", "Big Basket", None, 1000, 1000).await;
    let engine = engine(&db);

    let p = payload("sync-small", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    assert_eq!(outcome.sale.sale.discount_total_cents, 0);

    let p = payload("sync-big", vec![line("ps-cola", 4.0, "Cola 330ml")], 1000);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();
    assert_eq!(outcome.sale.sale.discount_total_cents, 100);
}

/// Engine that always fails, standing in for a corrupted rule set.
struct FailingDiscountEngine;

#[async_trait]
impl DiscountEngine for FailingDiscountEngine {
    async fn compute(
        &self,
        _conn: &mut SqliteConnection,
        _input: &DiscountInput,
    ) -> Result<DiscountOutcome, DiscountError> {
        Err(DiscountError::Internal("rule table corrupted".to_string()))
    }
}

#[tokio::test]
async fn test_discount_failure_never_blocks_the_sale() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = CheckoutEngine::new(db.clone(), Arc::new(FailingDiscountEngine));

    let p = payload("sync-fail", vec![line("ps-cola", 2.0, "Cola 330ml")], 480);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    // Fallback: client total, zero discount, sale committed normally.
    assert!(!outcome.duplicate);
    assert_eq!(outcome.sale.sale.total_cents, 480);
    assert_eq!(outcome.sale.sale.discount_total_cents, 0);
    assert_eq!(stock_quantity(&db, "ps-cola").await, 8.0);
}

#[tokio::test]
async fn test_discount_failure_clamps_negative_client_total() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    let engine = CheckoutEngine::new(db.clone(), Arc::new(FailingDiscountEngine));

    let p = payload("sync-neg", vec![line("ps-cola", 1.0, "Cola 330ml")], -250);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    assert_eq!(outcome.sale.sale.total_cents, 0);
}

// =============================================================================
// Consignment
// =============================================================================

#[tokio::test]
async fn test_consignment_sale_tags_supplier_on_movement() {
    let db = setup().await;
    seed_base(&db).await;
    sqlx::query("INSERT INTO suppliers (id, name) VALUES ('sup-1', 'Acme Distribution')")
        .execute(db.pool())
        .await
        .unwrap();
    seed_product(&db, "p-chips", "Chips", false, None, None).await;
    seed_stock(&db, "ps-chips-consign", "p-chips", 20.0, 80, 150, Some("sup-1")).await;
    let engine = engine(&db);

    let p = payload("sync-consign", vec![line("ps-chips-consign", 3.0, "Chips")], 450);
    let outcome = engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    let movements = db
        .movements()
        .list_for_sale(&outcome.sale.sale.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].supplier_id.as_deref(), Some("sup-1"));
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_sales_expands_names() {
    let db = setup().await;
    seed_simple_shop(&db).await;
    seed_rule(&db, "rule-10", "Ten Percent", None, 1000, 0).await;
    let engine = engine(&db);

    let p = payload("sync-list", vec![line("ps-cola", 2.0, "Cola 330ml")], 500);
    engine.commit_sale(STORE, PERIOD, OPERATOR, &p).await.unwrap();

    let listed = engine.list_sales(STORE, PERIOD).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].operator_name.as_deref(), Some("Ana"));
    assert_eq!(listed[0].lines.len(), 1);
    assert_eq!(listed[0].lines[0].product_name, "Cola 330ml");
    assert_eq!(listed[0].discounts.len(), 1);
    assert_eq!(listed[0].discounts[0].rule_name, "Ten Percent");

    let err = engine.list_sales(STORE, "period-nope").await.unwrap_err();
    assert!(matches!(
        err,
        CommitError::Core(CoreError::PeriodNotFound { .. })
    ));
}
