//! API error types and HTTP status mapping.
//!
//! ## Status Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  400  payload validation, no open period, wrong (closed) period        │
//! │  404  period id unknown for the store                                  │
//! │  500  business rejections (unknown products, decimal guard, bundle     │
//! │       guard, insufficient stock) and infrastructure failures           │
//! │                                                                         │
//! │  Business rejections as 500 matches what the deployed POS clients      │
//! │  already expect; changing them to 4xx would break their retry logic.   │
//! │                                                                         │
//! │  Every body is {"error": "<message>"}; the closed-period body also     │
//! │  carries the open period so the client can re-target queued sales.    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use caja_checkout::CommitError;
use caja_core::CoreError;

/// HTTP-facing error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The requested period is closed; the body reports the open one.
    #[error("{message}")]
    PeriodClosed {
        message: String,
        open_period_id: String,
        open_since: DateTime<Utc>,
    },

    #[error("{0}")]
    Internal(String),
}

impl From<CommitError> for ApiError {
    fn from(err: CommitError) -> Self {
        let message = err.to_string();
        match err {
            CommitError::Core(core) => match core {
                CoreError::Validation(_) | CoreError::NoOpenPeriod { .. } => {
                    ApiError::BadRequest(message)
                }
                CoreError::PeriodClosed {
                    open_period_id,
                    open_since,
                    ..
                } => ApiError::PeriodClosed {
                    message,
                    open_period_id,
                    open_since,
                },
                CoreError::PeriodNotFound { .. } => ApiError::NotFound(message),
                CoreError::ProductsNotFound { .. }
                | CoreError::DecimalNotAllowed { .. }
                | CoreError::ExcessiveBundleQuantity { .. }
                | CoreError::InsufficientBundleStock { .. }
                | CoreError::InsufficientStock { .. } => ApiError::Internal(message),
            },
            CommitError::Db(db) => {
                error!(error = %db, "Database failure");
                ApiError::Internal(db.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::PeriodClosed {
                message,
                open_period_id,
                open_since,
            } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": message,
                    "periodoAbiertoId": open_period_id,
                    "abiertoDesde": open_since,
                }),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caja_core::ValidationError;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err: ApiError = CommitError::Core(CoreError::Validation(
            ValidationError::EmptyProducts,
        ))
        .into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_period_closed_carries_open_period() {
        let err: ApiError = CommitError::Core(CoreError::PeriodClosed {
            requested: "old".to_string(),
            open_period_id: "current".to_string(),
            open_since: Utc::now(),
        })
        .into();
        match err {
            ApiError::PeriodClosed { open_period_id, .. } => {
                assert_eq!(open_period_id, "current");
            }
            other => panic!("expected PeriodClosed, got {other:?}"),
        }
    }

    #[test]
    fn test_business_rejections_map_to_internal() {
        let err: ApiError = CommitError::Core(CoreError::ProductsNotFound {
            items: vec!["Cola".to_string()],
        })
        .into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
