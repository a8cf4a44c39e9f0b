//! # Accounting Period Validation
//!
//! Guards the commit against sales landing in the wrong period.
//!
//! ## Why This Matters
//! Offline devices replay queued sales hours or days later, and the period
//! they were queued under may have been closed since. Accepting such a sale
//! silently would corrupt the closed period's reconciliation, so the commit
//! rejects it and tells the client which period is open now. The client
//! re-targets the queued sale and retries.

use caja_core::{AccountingPeriod, CoreError};
use caja_db::PeriodRepository;

use crate::error::CommitResult;

/// Validates that `requested_period_id` is the store's open period.
///
/// ## Outcomes
/// - No open period at all → [`CoreError::NoOpenPeriod`]
/// - Requested id unknown for this store → [`CoreError::PeriodNotFound`]
/// - Requested period exists but a different one is open →
///   [`CoreError::PeriodClosed`], carrying the open period's id and opening
///   time so the client can re-target
/// - Requested id is the open period → `Ok`
pub async fn validate_period(
    periods: &PeriodRepository,
    store_id: &str,
    requested_period_id: &str,
) -> CommitResult<AccountingPeriod> {
    let open = periods.find_open(store_id).await?;

    let Some(open) = open else {
        return Err(CoreError::NoOpenPeriod {
            store_id: store_id.to_string(),
        }
        .into());
    };

    if open.id == requested_period_id {
        return Ok(open);
    }

    match periods.get_by_id(store_id, requested_period_id).await? {
        Some(_) => Err(CoreError::PeriodClosed {
            requested: requested_period_id.to_string(),
            open_period_id: open.id,
            open_since: open.opened_at,
        }
        .into()),
        None => Err(CoreError::PeriodNotFound {
            period_id: requested_period_id.to_string(),
        }
        .into()),
    }
}
