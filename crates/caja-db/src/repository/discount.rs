//! # Discount Rule Repository
//!
//! Read access to the discount rule table. Rule administration (creating,
//! toggling, pricing rules) belongs to the back-office subsystem; the
//! commit path only loads active rules for the store being sold in.

use serde::Serialize;
use sqlx::SqliteConnection;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// One configured discount rule.
///
/// `code = None` means the rule applies automatically; otherwise the
/// client must send the code in the sale payload for the rule to fire.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiscountRule {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub code: Option<String>,
    /// Percentage discount in basis points (1000 = 10%).
    pub percent_bps: i64,
    /// Rule fires only when the sale subtotal reaches this amount.
    pub min_subtotal_cents: i64,
    pub is_active: bool,
}

/// Repository for discount rule lookups.
#[derive(Debug, Clone)]
pub struct DiscountRuleRepository {
    pool: SqlitePool,
}

impl DiscountRuleRepository {
    /// Creates a new DiscountRuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRuleRepository { pool }
    }

    /// Lists active rules for a store inside the caller's transaction.
    ///
    /// Runs on the commit transaction's connection so the rules seen are
    /// consistent with everything else the commit reads.
    pub async fn list_active(
        &self,
        conn: &mut SqliteConnection,
        store_id: &str,
    ) -> DbResult<Vec<DiscountRule>> {
        let rules = sqlx::query_as::<_, DiscountRule>(
            r#"
            SELECT id, store_id, name, code, percent_bps, min_subtotal_cents, is_active
            FROM discount_rules
            WHERE store_id = ?1 AND is_active = 1
            ORDER BY percent_bps DESC
            "#,
        )
        .bind(store_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rules)
    }

    /// Looks up a rule's display name.
    pub async fn rule_name(&self, rule_id: &str) -> DbResult<Option<String>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT name FROM discount_rules WHERE id = ?1")
                .bind(rule_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(name)
    }
}
